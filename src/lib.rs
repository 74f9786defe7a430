pub mod access;
pub mod binding;
pub mod codegen;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod manifest;
pub mod marshall;
pub mod reflection;
pub mod shape;
pub mod types;

use tracing::debug;

use access::CallMode;
use binding::{BoundCall, CallArgs, Vectorization};
use config::BindOptions;
use context::CallContext;
use diagnostic::Result;
use marshall::MarshallRegistry;
use reflection::KernelFunction;
use types::TypeLayout;

/// A fully resolved call: the annotated binding tree, the global dispatch
/// rank and the generated call-data module.
#[derive(Clone, Debug)]
pub struct CallSignature {
    pub call: BoundCall,
    pub call_dimensionality: usize,
    pub code: String,
}

/// Bind host arguments to `function` and generate its call data.
///
/// Runs tree build, bind, explicit and implicit vectorization, dispatch
/// rank inference, finalize, differentiability and code generation. The
/// first failure aborts the whole build.
pub fn build_call_signature(
    registry: &MarshallRegistry,
    layout: &dyn TypeLayout,
    function: &KernelFunction,
    mode: CallMode,
    options: BindOptions,
    args: &CallArgs,
    explicit: &Vectorization,
) -> Result<CallSignature> {
    let mut ctx = CallContext::new(layout, mode, options);

    let mut call = BoundCall::new(registry, args)?;
    call.bind(function)?;
    call.apply_explicit_vectorization(&ctx, registry, explicit)?;
    call.apply_implicit_vectorization(&ctx)?;

    ctx.call_dimensionality = call.call_dimensionality();
    call.finalize_mappings(&ctx)?;
    call.calculate_differentiability(&ctx)?;

    let code = call.gen_code(&ctx)?.finish();
    debug!(
        function = %function.name,
        mode = %mode,
        call_dimensionality = ctx.call_dimensionality,
        "built call signature"
    );
    Ok(CallSignature {
        call_dimensionality: ctx.call_dimensionality,
        call,
        code,
    })
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::binding::{Override, RESULT_ARG};
    use crate::diagnostic::BindErrorKind;
    use crate::marshall::HostValue;
    use crate::reflection::{KernelParam, Modifier};
    use crate::types::{KernelField, KernelType, ModuleLayout, ScalarType};

    fn float() -> KernelType {
        KernelType::scalar(ScalarType::Float)
    }

    fn add() -> KernelFunction {
        KernelFunction::new("add")
            .with_param(KernelParam::new("a", float()))
            .with_param(KernelParam::new("b", float()))
            .returning(float())
            .differentiable(true)
    }

    fn build(
        function: &KernelFunction,
        mode: CallMode,
        args: &CallArgs,
        explicit: &Vectorization,
    ) -> Result<CallSignature> {
        let registry = MarshallRegistry::builtin();
        let layout = ModuleLayout::new();
        build_call_signature(
            &registry,
            &layout,
            function,
            mode,
            BindOptions::default(),
            args,
            explicit,
        )
    }

    #[test]
    fn test_scalar_and_buffer_call() {
        let args = CallArgs::new()
            .arg(HostValue::Float(1.0))
            .arg(HostValue::buffer(float(), &[4], false))
            .kwarg(RESULT_ARG, HostValue::value_ref(HostValue::Float(0.0)));
        let sig = build(&add(), CallMode::Forward, &args, &Vectorization::new()).unwrap();
        assert_eq!(sig.call_dimensionality, 1);
        insta::assert_snapshot!(sig.code, @r###"
        typealias _t_a = ValueType<float>;
        static const int _m_a = 0;
        typealias _t_b = NDBuffer<float,1>;
        static const int[] _m_b = { 0 };
        typealias _t__result = RWValueRef<float>;
        static const int _m__result = 0;

        struct CallData
        {
            _t_a a;
            _t_b b;
            _t__result _result;
        };
        ParameterBlock<CallData> call_data;

        [Differentiable]
        void _trampoline(no_diff in float a, no_diff in float b, no_diff out float _result)
        {
            _result = add(a, b);
        }
        "###);
    }

    #[test]
    fn test_backward_diff_buffers() {
        let args = CallArgs::new()
            .arg(HostValue::diff_buffer(float(), &[8], false, true))
            .arg(HostValue::Float(2.0))
            .kwarg(RESULT_ARG, HostValue::diff_buffer(float(), &[8], true, true));
        let sig = build(&add(), CallMode::Backward, &args, &Vectorization::new()).unwrap();
        insta::assert_snapshot!(sig.code, @r###"
        struct _t_a
        {
            NDBuffer<float,1> primal;
            RWNDBuffer<float,1> derivative;

            void load_primal(IContext context, out float value)
            {
                this.primal.load_primal(context, value);
            }

            void store_primal(IContext context, in float value)
            {
                this.primal.store_primal(context, value);
            }

            void load_derivative(IContext context, out float.Differential value)
            {
                this.derivative.load_primal(context, value);
            }

            void store_derivative(IContext context, in float.Differential value)
            {
                this.derivative.store_primal(context, value);
            }
        };
        static const int[] _m_a = { 0 };
        typealias _t_b = ValueType<float>;
        static const int _m_b = 0;
        struct _t__result
        {
            NoneType primal;
            NDBuffer<float,1> derivative;

            void load_derivative(IContext context, out float.Differential value)
            {
                this.derivative.load_primal(context, value);
            }

            void store_derivative(IContext context, in float.Differential value)
            {
                this.derivative.store_primal(context, value);
            }
        };
        static const int[] _m__result = { 0 };

        struct CallData
        {
            _t_a a;
            _t_b b;
            _t__result _result;
        };
        ParameterBlock<CallData> call_data;

        [Differentiable]
        void _trampoline(in float a, no_diff in float b, out float _result)
        {
            _result = add(a, b);
        }
        "###);
    }

    #[test]
    fn test_nested_struct_call() {
        let point = KernelType::structure(
            "Point",
            vec![
                KernelField::new("x", float()),
                KernelField::new("y", float()),
            ],
            false,
        );
        let function = KernelFunction::new("translate")
            .with_param(KernelParam::new("p", point).with_modifier(Modifier::InOut))
            .with_param(KernelParam::new("offset", float()));
        let args = CallArgs::new()
            .arg(HostValue::dict([
                ("x", HostValue::buffer(float(), &[2, 3], true)),
                ("y", HostValue::buffer(float(), &[3], true)),
            ]))
            .arg(HostValue::Float(0.5));
        let explicit = Vectorization::new().arg(Override::fields([("y", Override::axes(&[0]))]));
        let sig = build(&function, CallMode::Forward, &args, &explicit).unwrap();
        assert_eq!(sig.call_dimensionality, 2);
        insta::assert_snapshot!(sig.code, @r###"
        struct _t_p
        {
            typealias _t_x = RWNDBuffer<float,2>;
            static const int[] _m_x = { 0,1 };
            typealias _t_y = RWNDBuffer<float,1>;
            static const int[] _m_y = { 0 };
            _t_x x;
            _t_y y;


            void load_primal(IContext context, out Point value)
            {
                float x;
                this.x.load_primal(ctx(context, _m_x),x);
                value.x = x;
                float y;
                this.y.load_primal(ctx(context, _m_y),y);
                value.y = y;
            }

            void store_primal(IContext context, in Point value)
            {
                this.x.store_primal(ctx(context, _m_x),value.x);
                this.y.store_primal(ctx(context, _m_y),value.y);
            }
        };
        static const int[] _m_p = { 0,1 };
        typealias _t_offset = ValueType<float>;
        static const int _m_offset = 0;

        struct CallData
        {
            _t_p p;
            _t_offset offset;
        };
        ParameterBlock<CallData> call_data;

        void _trampoline(no_diff inout Point p, no_diff in float offset)
        {
            translate(p, offset);
        }
        "###);
    }

    #[test]
    fn test_first_error_aborts_build() {
        let args = CallArgs::new()
            .arg(HostValue::Float(1.0))
            .arg(HostValue::Float(2.0))
            .kwarg(RESULT_ARG, HostValue::Float(0.0));
        let err = build(&add(), CallMode::Forward, &args, &Vectorization::new()).unwrap_err();
        assert_eq!(err.kind, BindErrorKind::NonWritableWrite);
        assert_eq!(err.path, RESULT_ARG);
    }

    #[test]
    fn test_signature_hash_distinguishes_host_types() {
        let registry = MarshallRegistry::builtin();
        let float_args = CallArgs::new()
            .arg(HostValue::Float(1.0))
            .arg(HostValue::Float(2.0));
        let buffer_args = CallArgs::new()
            .arg(HostValue::Float(1.0))
            .arg(HostValue::buffer(float(), &[4], false));
        let mut a = BoundCall::new(&registry, &float_args).unwrap();
        let mut b = BoundCall::new(&registry, &buffer_args).unwrap();
        a.bind(&add()).unwrap();
        b.bind(&add()).unwrap();
        assert_ne!(a.signature_hash(), b.signature_hash());

        let again = build(&add(), CallMode::Backward, &float_args, &Vectorization::new()).unwrap();
        assert_eq!(again.call.signature_hash(), a.signature_hash());
    }
}
