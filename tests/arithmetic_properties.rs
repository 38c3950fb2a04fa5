// Integer operators agree with two's-complement arithmetic on random operands

mod common;

use common::{init_logging, runtime_tag};
use proptest::prelude::*;

fn evaluate(a: i32, op: &str, b: i32) -> Result<String, krun::Failure> {
    init_logging();
    let source = format!(
        "int main() {{ int a = {}; int b = {}; printf(\"%d\\n\", a {} b); return 0; }}",
        a, b, op
    );
    krun::run(&source).map(|run| run.stdout_str())
}

fn expected(value: i32) -> String {
    format!("{}\n", value)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_add_sub_mul_wrap(a in any::<i32>(), b in any::<i32>()) {
        prop_assert_eq!(evaluate(a, "+", b).unwrap(), expected(a.wrapping_add(b)));
        prop_assert_eq!(evaluate(a, "-", b).unwrap(), expected(a.wrapping_sub(b)));
        prop_assert_eq!(evaluate(a, "*", b).unwrap(), expected(a.wrapping_mul(b)));
    }

    #[test]
    fn test_div_rem_truncate(a in any::<i32>(), b in any::<i32>().prop_filter("nonzero divisor", |b| *b != 0)) {
        prop_assert_eq!(evaluate(a, "/", b).unwrap(), expected(a.wrapping_div(b)));
        prop_assert_eq!(evaluate(a, "%", b).unwrap(), expected(a.wrapping_rem(b)));
    }

    #[test]
    fn test_zero_divisor_is_a_division_error(a in any::<i32>()) {
        for op in ["/", "%"] {
            let failure = evaluate(a, op, 0).unwrap_err();
            prop_assert_eq!(runtime_tag(&failure), "division");
        }
    }
}

#[test]
fn test_min_int_edge_cases() {
    assert_eq!(evaluate(i32::MIN, "/", -1).unwrap(), expected(i32::MIN));
    assert_eq!(evaluate(i32::MIN, "%", -1).unwrap(), expected(0));
    assert_eq!(evaluate(i32::MIN, "-", 1).unwrap(), expected(i32::MAX));
}
