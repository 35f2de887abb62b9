//! End-to-end behavior of the strip-locals-init optimization on concrete
//! CIL fragments.

use std::sync::Arc;

use ilopt::il::{decode_stream, CilType, MethodBody, MethodSig, Operand, ParamSig};
use ilopt::metadata::{MethodDef, Module, TypeDef};
use ilopt::optimize::{MethodOutcome, Mode, Optimization, Optimizer, StripLocalsInit};

fn body(code: &[u8], locals: Vec<CilType>) -> MethodBody {
    MethodBody::new(decode_stream(code).unwrap(), locals, Vec::new(), false)
}

fn method(body: MethodBody) -> MethodDef {
    MethodDef {
        name: "M".into(),
        body: Some(body),
        fat_header: true,
        ..MethodDef::default()
    }
}

fn outcome(mut method: MethodDef, mode: Mode) -> MethodOutcome {
    StripLocalsInit::new(mode).apply(&mut method).unwrap()
}

fn int_struct() -> CilType {
    CilType::ValueType { underlying: None }
}

#[test]
fn simple_root_block_assignment() {
    // ldc.i4.0; stloc.0; ldloc.0; ret
    let code = [0x16, 0x0A, 0x06, 0x2A];
    assert_eq!(
        outcome(method(body(&code, vec![CilType::I4])), Mode::None),
        MethodOutcome::Updated
    );
    assert_eq!(
        outcome(method(body(&code, vec![CilType::I4])), Mode::All),
        MethodOutcome::Updated
    );
}

#[test]
fn read_before_write() {
    // ldloc.0; ret
    let code = [0x06, 0x2A];
    assert_eq!(
        outcome(method(body(&code, vec![CilType::I4])), Mode::None),
        MethodOutcome::Failed
    );
    assert_eq!(
        outcome(method(body(&code, vec![CilType::I4])), Mode::All),
        MethodOutcome::Updated
    );
}

#[test]
fn initobj_through_ldloca() {
    // ldloca.s 0; initobj MyStruct; ret
    let code = [0x12, 0x00, 0xFE, 0x15, 0x01, 0x00, 0x00, 0x02, 0x2A];
    assert_eq!(
        outcome(method(body(&code, vec![int_struct()])), Mode::None),
        MethodOutcome::Updated
    );
}

#[test]
fn constructor_through_ldloca() {
    // ldloca.s 0; call instance void MyStruct::.ctor(); ret
    let code = [0x12, 0x00, 0x28, 0x01, 0x00, 0x00, 0x06, 0x2A];
    let mut b = body(&code, vec![int_struct()]);
    b.instructions[1].operand = Operand::Method(Arc::new(MethodSig {
        has_this: true,
        explicit_this: false,
        is_ctor: true,
        params: Vec::new(),
        return_type: CilType::Void,
    }));
    assert_eq!(outcome(method(b), Mode::None), MethodOutcome::Updated);
}

#[test]
fn out_parameter_assignment() {
    // ldloca.s 0; call void C::Fill(int32&); ldloc.0; ret
    let code = [0x12, 0x00, 0x28, 0x01, 0x00, 0x00, 0x06, 0x06, 0x2A];
    let fill = Arc::new(MethodSig {
        has_this: false,
        explicit_this: false,
        is_ctor: false,
        params: vec![ParamSig::out(CilType::I4)],
        return_type: CilType::Void,
    });
    let make = || {
        let mut b = body(&code, vec![CilType::I4]);
        b.instructions[1].operand = Operand::Method(fill.clone());
        method(b)
    };
    assert_eq!(outcome(make(), Mode::None), MethodOutcome::Failed);
    assert_eq!(outcome(make(), Mode::Out), MethodOutcome::Updated);
    assert_eq!(outcome(make(), Mode::CSharp), MethodOutcome::Updated);
}

#[test]
fn byref_without_out_contract_is_not_trusted() {
    // Same shape as out_parameter_assignment, but the parameter is a plain
    // by-ref: even out-mode must not trust it.
    let code = [0x12, 0x00, 0x28, 0x01, 0x00, 0x00, 0x06, 0x06, 0x2A];
    let fill = Arc::new(MethodSig {
        has_this: false,
        explicit_this: false,
        is_ctor: false,
        params: vec![ParamSig::plain(CilType::ByRef(Box::new(CilType::I4)))],
        return_type: CilType::Void,
    });
    let mut b = body(&code, vec![CilType::I4]);
    b.instructions[1].operand = Operand::Method(fill);
    assert_eq!(outcome(method(b), Mode::Out), MethodOutcome::Failed);
}

#[test]
fn localloc_present() {
    // ldc.i4 16; localloc; pop; ret
    let code = [0x20, 0x10, 0x00, 0x00, 0x00, 0xFE, 0x0F, 0x26, 0x2A];
    for (mode, expected) in [
        (Mode::None, MethodOutcome::Failed),
        (Mode::Out, MethodOutcome::Failed),
        (Mode::Stackalloc, MethodOutcome::Updated),
        (Mode::CSharp, MethodOutcome::Updated),
        (Mode::All, MethodOutcome::Updated),
    ] {
        assert_eq!(
            outcome(method(body(&code, Vec::new())), mode),
            expected,
            "{mode:?}"
        );
    }
}

#[test]
fn cross_block_write_is_conservatively_rejected() {
    // br L2; L1: ldloc.0; ret; L2: ldc.i4.0; stloc.0; br L1
    let code = [0x2B, 0x02, 0x06, 0x2A, 0x16, 0x0A, 0x2B, 0xFA];
    assert_eq!(
        outcome(method(body(&code, vec![CilType::I4])), Mode::None),
        MethodOutcome::Failed
    );
    assert_eq!(
        outcome(method(body(&code, vec![CilType::I4])), Mode::All),
        MethodOutcome::Updated
    );
}

#[test]
fn bodyless_and_already_clear_methods_are_skipped() {
    let strip = StripLocalsInit::new(Mode::CSharp);

    let mut bodyless = MethodDef {
        name: "Extern".into(),
        ..MethodDef::default()
    };
    assert_eq!(strip.apply(&mut bodyless).unwrap(), MethodOutcome::Skipped);

    let mut clear = method(body(&[0x2A], Vec::new()));
    clear.body.as_mut().unwrap().init_locals = false;
    assert_eq!(strip.apply(&mut clear).unwrap(), MethodOutcome::Skipped);
}

#[test]
fn no_locals_with_flag_set_is_updated() {
    assert_eq!(
        outcome(method(body(&[0x2A], Vec::new())), Mode::None),
        MethodOutcome::Updated
    );
}

/// A module with one method per §8 scenario shape.
fn sample_module() -> Module {
    let methods = vec![
        method(body(&[0x16, 0x0A, 0x06, 0x2A], vec![CilType::I4])), // proven
        method(body(&[0x06, 0x2A], vec![CilType::I4])),             // read first
        method(body(
            &[0x20, 0x10, 0x00, 0x00, 0x00, 0xFE, 0x0F, 0x26, 0x2A],
            Vec::new(),
        )), // localloc
        method(body(&[0x2A], Vec::new())),                          // no locals
        MethodDef {
            name: "Extern".into(),
            ..MethodDef::default()
        },
    ];
    Module {
        name: "sample".into(),
        types: vec![TypeDef {
            namespace: "App".into(),
            name: "Program".into(),
            methods,
            ..TypeDef::default()
        }],
        event_count: 2,
        property_count: 3,
    }
}

fn updated_under(mode: Mode) -> usize {
    let mut module = sample_module();
    let mut optimizer = Optimizer::new();
    optimizer.add(Box::new(StripLocalsInit::new(mode)));
    let report = optimizer.run(&mut module).unwrap();
    report.optimizations[0].updated
}

#[test]
fn mode_monotonicity_over_a_module() {
    let none = updated_under(Mode::None);
    let out = updated_under(Mode::Out);
    let stackalloc = updated_under(Mode::Stackalloc);
    let csharp = updated_under(Mode::CSharp);
    let all = updated_under(Mode::All);

    assert!(none <= out);
    assert!(out <= csharp);
    assert!(none <= stackalloc);
    assert!(stackalloc <= csharp);
    assert!(csharp <= all);
    // all strips exactly the methods with a body and the flag set.
    assert_eq!(all, 4);
}

#[test]
fn driver_reports_processed_counts() {
    let mut module = sample_module();
    let mut optimizer = Optimizer::new();
    optimizer.add(Box::new(StripLocalsInit::new(Mode::CSharp)));
    let report = optimizer.run(&mut module).unwrap();

    assert_eq!(report.modules, 1);
    assert_eq!(report.types, 1);
    assert_eq!(report.events, 2);
    assert_eq!(report.properties, 3);
    assert_eq!(report.methods, 5);

    let stats = &report.optimizations[0];
    assert_eq!(stats.updated + stats.skipped + stats.failed, 5);
    assert_eq!(stats.updated, 3); // proven, localloc (csharp), no-locals
    assert_eq!(stats.skipped, 1); // bodyless
    assert_eq!(stats.failed, 1); // read-before-write
}

#[test]
fn optimizing_twice_updates_nothing_new() {
    let mut module = sample_module();
    let mut optimizer = Optimizer::new();
    optimizer.add(Box::new(StripLocalsInit::new(Mode::CSharp)));
    let first = optimizer.run(&mut module).unwrap();
    assert!(first.optimizations[0].updated > 0);

    let second = optimizer.run(&mut module).unwrap();
    assert_eq!(second.optimizations[0].updated, 0);
    assert_eq!(
        second.optimizations[0].skipped,
        first.optimizations[0].skipped + first.optimizations[0].updated
    );
}

#[test]
fn filter_restricts_the_optimized_methods() {
    let mut module = sample_module();
    let mut optimizer =
        Optimizer::new().with_filter(regex::Regex::new(r"App\.Program::M$").unwrap());
    optimizer.add(Box::new(StripLocalsInit::new(Mode::All)));
    let report = optimizer.run(&mut module).unwrap();
    // Four methods named M match; Extern does not.
    assert_eq!(report.optimizations[0].updated, 4);
    assert_eq!(report.optimizations[0].skipped, 1);
}
