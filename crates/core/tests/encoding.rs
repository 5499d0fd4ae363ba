use upgrade_harness_core::codegen::encoder::{
    call_args, encode_call, param_name, selector_expr, wrapper_params,
};
use upgrade_harness_core::codegen::similarity::{ratio, similar, SIMILARITY_THRESHOLD};
use upgrade_harness_core::model::{camel_case, ContractDescriptor, FunctionDescriptor};

fn func(name: &str, inputs: &[&str]) -> FunctionDescriptor {
    FunctionDescriptor::new(name, inputs.iter().map(|s| s.to_string()).collect(), vec![])
}

#[test]
fn parameter_names_overflow_with_a_round_number() {
    assert_eq!(param_name(0), "a");
    assert_eq!(param_name(25), "z");
    assert_eq!(param_name(26), "a1");
    assert_eq!(param_name(27), "b1");
    assert_eq!(param_name(52), "a2");
    assert_eq!(call_args(3), vec!["a", "b", "c"]);
}

#[test]
fn wrapper_params_add_memory_locations() {
    let f = func("set", &["string", "uint", "bytes32[]", "address"]);
    assert_eq!(
        wrapper_params(&f),
        "string memory a, uint256 b, bytes32[] memory c, address d"
    );
}

#[test]
fn selectors_fall_back_to_literals_for_overloads() {
    let token = ContractDescriptor::new(
        "Token",
        "V2",
        vec![
            func("transfer", &["address", "uint256"]),
            func("transfer", &["address", "uint256", "bytes"]),
            func("approve", &["address", "uint256"]),
        ],
    )
    .expect("descriptor");
    assert_eq!(selector_expr(&token, &token.functions()[0]), "bytes4(0xa9059cbb)");
    assert_eq!(selector_expr(&token, &token.functions()[2]), "ITokenV2.approve.selector");
    assert!(token.is_overloaded("transfer"));

    let args = call_args(2);
    assert_eq!(
        encode_call(&token, &token.functions()[2], &args),
        "abi.encodeWithSelector(ITokenV2.approve.selector, a, b)"
    );
}

#[test]
fn selector_of_foreign_shape_is_a_literal() {
    // V1 lacks the function; V2's shape is encoded against V1's interface.
    let v1 = ContractDescriptor::new("Token", "V1", vec![func("approve", &["address"])])
        .expect("descriptor");
    let shape = func("approve", &["address", "uint256"]);
    assert_eq!(selector_expr(&v1, &shape), "bytes4(0x095ea7b3)");
}

#[test]
fn similarity_threshold_is_strict() {
    assert!((SIMILARITY_THRESHOLD - 0.90).abs() < f64::EPSILON);
    assert!(similar("withdraw", "withdraw2"));
    assert!(similar("Withdraw", "withdraw"));
    assert!(!similar("withdraw", "withdrawAll"));
    assert!(ratio("withdraw", "withdrawAll") < SIMILARITY_THRESHOLD);
}

#[test]
fn camel_case_is_exposed_from_the_model() {
    assert_eq!(camel_case("Transparent_Upgradeable-Proxy"), "transparentUpgradeableProxy");
    assert_eq!(camel_case("my contract"), "myContract");
}
