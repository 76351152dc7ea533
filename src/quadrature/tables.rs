//! Gauss-Hermite nodes and weights for the physicists' weight exp(-x²)
//!
//! Nodes ascending, weights summing to √π. Values are the shortest
//! round-trip f64 representations of the exact roots and Christoffel numbers.

pub(super) const GH5_NODES: [f64; 5] = [
    -2.0201828704560856,
    -0.9585724646138185,
    0.0,
    0.9585724646138185,
    2.0201828704560856,
];
pub(super) const GH5_WEIGHTS: [f64; 5] = [
    0.019953242059045913,
    0.3936193231522412,
    0.9453087204829419,
    0.3936193231522412,
    0.019953242059045913,
];

pub(super) const GH11_NODES: [f64; 11] = [
    -3.6684708465595826,
    -2.783290099781652,
    -2.0259480158257555,
    -1.3265570844949328,
    -0.6568095668820998,
    0.0,
    0.6568095668820998,
    1.3265570844949328,
    2.0259480158257555,
    2.783290099781652,
    3.6684708465595826,
];
pub(super) const GH11_WEIGHTS: [f64; 11] = [
    1.4395603937142582e-06,
    0.0003468194663233455,
    0.011911395444911533,
    0.11722787516770851,
    0.429359752356125,
    0.6547592869145917,
    0.429359752356125,
    0.11722787516770851,
    0.011911395444911533,
    0.0003468194663233455,
    1.4395603937142582e-06,
];

pub(super) const GH21_NODES: [f64; 21] = [
    -5.550351873264678,
    -4.773992343411219,
    -4.12199554749184,
    -3.5319728771376777,
    -2.979991207704598,
    -2.453552124512838,
    -1.944962949186254,
    -1.448934250650732,
    -0.961499634418369,
    -0.4794507070791076,
    0.0,
    0.4794507070791076,
    0.961499634418369,
    1.448934250650732,
    1.944962949186254,
    2.453552124512838,
    2.979991207704598,
    3.5319728771376777,
    4.12199554749184,
    4.773992343411219,
    5.550351873264678,
];
pub(super) const GH21_WEIGHTS: [f64; 21] = [
    3.720365070136049e-14,
    8.818611242049951e-11,
    2.5712301800593137e-08,
    2.1718848980566694e-06,
    7.478398867310061e-05,
    0.0012549820417264105,
    0.011414065837434383,
    0.06017964665891227,
    0.19212032406699775,
    0.3816690736135021,
    0.47902370312017767,
    0.3816690736135021,
    0.19212032406699775,
    0.06017964665891227,
    0.011414065837434383,
    0.0012549820417264105,
    7.478398867310061e-05,
    2.1718848980566694e-06,
    2.5712301800593137e-08,
    8.818611242049951e-11,
    3.720365070136049e-14,
];

pub(super) const GH41_NODES: [f64; 41] = [
    -8.213000895598281,
    -7.528945464539621,
    -6.960358400636749,
    -6.450984597174753,
    -5.979365004165134,
    -5.534441340613446,
    -5.109569626533134,
    -4.7003568963041165,
    -4.303698767154651,
    -3.917289854837782,
    -3.5393499373637116,
    -3.1684594539419857,
    -2.8034549614843187,
    -2.443359553123411,
    -2.0873346819187244,
    -1.7346456088220292,
    -1.3846357891600325,
    -1.036707252924206,
    -0.6903050523302081,
    -0.34490446301543276,
    0.0,
    0.34490446301543276,
    0.6903050523302081,
    1.036707252924206,
    1.3846357891600325,
    1.7346456088220292,
    2.0873346819187244,
    2.443359553123411,
    2.8034549614843187,
    3.1684594539419857,
    3.5393499373637116,
    3.917289854837782,
    4.303698767154651,
    4.7003568963041165,
    5.109569626533134,
    5.534441340613446,
    5.979365004165134,
    6.450984597174753,
    6.960358400636749,
    7.528945464539621,
    8.213000895598281,
];
pub(super) const GH41_WEIGHTS: [f64; 41] = [
    4.00195966466648e-30,
    1.472653728652063e-25,
    4.868737936012915e-22,
    4.1234085375314975e-19,
    1.3569875295861109e-16,
    2.162987247175024e-14,
    1.9103833646809183e-12,
    1.0226798927782287e-10,
    3.5356816483806877e-09,
    8.272658418749823e-08,
    1.3573781404870804e-06,
    1.6055965736677247e-05,
    0.00013993025659674165,
    0.0009142342563287078,
    0.004540392987303271,
    0.017330881362116825,
    0.051289872397094684,
    0.11848439124684408,
    0.21473086449008447,
    0.30636781693785126,
    0.34482208361638966,
    0.30636781693785126,
    0.21473086449008447,
    0.11848439124684408,
    0.051289872397094684,
    0.017330881362116825,
    0.004540392987303271,
    0.0009142342563287078,
    0.00013993025659674165,
    1.6055965736677247e-05,
    1.3573781404870804e-06,
    8.272658418749823e-08,
    3.5356816483806877e-09,
    1.0226798927782287e-10,
    1.9103833646809183e-12,
    2.162987247175024e-14,
    1.3569875295861109e-16,
    4.1234085375314975e-19,
    4.868737936012915e-22,
    1.472653728652063e-25,
    4.00195966466648e-30,
];
