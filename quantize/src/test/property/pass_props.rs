use proptest::prelude::*;

use quanta_dtype::test::generators::per_tensor_i8;
use quanta_ir::{Module, OpKind};

use super::generators::{arb_marked_steps, build_marked_chain};
use crate::{InferenceType, QuantizePass, QuantizePassOptions, quantizable::is_already_quantized};

const ELEMENTWISE: [OpKind; 5] = [OpKind::Add, OpKind::Subtract, OpKind::Multiply, OpKind::Maximum, OpKind::Minimum];

fn markers(module: &Module) -> usize {
    module.count(OpKind::QuantizeCast) + module.count(OpKind::DequantizeCast)
}

proptest! {
    #[test]
    fn pass_converges_without_inventing_markers(input in per_tensor_i8(), steps in arb_marked_steps(10)) {
        let mut module = build_marked_chain(&input, &steps);
        let before = markers(&module);

        let outcome = QuantizePass::default().run(&mut module);
        prop_assert!(outcome.converged(), "{}", module);
        prop_assert!(module.diagnostics().is_empty());
        prop_assert!(markers(&module) <= before);
        // Each rewrite absorbs at least one marker.
        prop_assert!(before - markers(&module) >= outcome.stats.rewrites);
    }

    #[test]
    fn quantized_ops_have_no_float_values_left(input in per_tensor_i8(), steps in arb_marked_steps(10)) {
        let mut module = build_marked_chain(&input, &steps);
        QuantizePass::default().run(&mut module);

        for op in module.walk() {
            let Some(kind) = module.kind(op) else { continue };
            if !ELEMENTWISE.contains(&kind) || !is_already_quantized(&module, op) {
                continue;
            }
            let operation = module.op(op).unwrap();
            for &value in operation.operands().iter().chain(operation.results()) {
                prop_assert!(module.value_type(value).unwrap().is_quantized(), "{}", module);
            }
        }
    }

    #[test]
    fn second_run_is_a_no_op(input in per_tensor_i8(), steps in arb_marked_steps(10)) {
        let mut module = build_marked_chain(&input, &steps);
        let pass = QuantizePass::default();
        pass.run(&mut module);
        let before = module.to_string();

        let again = pass.run(&mut module);
        prop_assert_eq!(again.stats.rewrites, 0);
        prop_assert_eq!(module.to_string(), before);
    }

    #[test]
    fn float_inference_changes_nothing(input in per_tensor_i8(), steps in arb_marked_steps(10)) {
        let mut module = build_marked_chain(&input, &steps);
        let before = module.to_string();
        let options = QuantizePassOptions::builder().inference_type(InferenceType::Float32).build();

        let outcome = QuantizePass::new(&options).run(&mut module);
        prop_assert_eq!(outcome.stats.rewrites, 0);
        prop_assert_eq!(module.to_string(), before);
    }
}
