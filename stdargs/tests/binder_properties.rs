// Behavioural properties of the parser and binder, exercised through the
// public API with the in-memory store.

use stdargs::binder::{bind, bind_format, plan};
use stdargs::dim_resolve::{Advance, Cursors, DimWalk, Reference};
use stdargs::error::{BindError, ErrorKind};
use stdargs::host::{ValueId, ValueStore};
use stdargs::memstore::{MemStore, SimpleLoops};
use stdargs::spec::{DimensionOp, ParamKind, ParameterSpecList};
use stdargs::type_infer::ElementType::*;

fn spec(format: &str) -> ParameterSpecList {
    ParameterSpecList::parse(format).unwrap_or_else(|e| panic!("{format}: {e}"))
}

fn planned_dims(store: &MemStore, args: &[Option<ValueId>], format: &str, index: usize) -> Vec<usize> {
    let plan = plan(store, args, &spec(format)).unwrap();
    plan.params()[index].dims.clone()
}

// ── Parsing ─────────────────────────────────────────────────────────────────

#[test]
fn parsing_is_deterministic() {
    for format in ["i", "iD;r&", "i>3;o<F^[0]{0}@=,+2-3,-,:#?", "iB;r~L&"] {
        assert_eq!(spec(format), spec(format), "{format}");
    }
}

#[test]
fn single_return_is_moved_last() {
    let list = spec("r;iD;o2");
    assert!(list.has_return());
    assert_eq!(list.len(), 3);
    assert_eq!(list.params()[2].kind, ParamKind::Return);
    assert_eq!(list.params()[0].fixed_type, Some(Double));
    assert_eq!(list.in_out_count(), 2);
    assert_eq!(list.to_string(), "iD;o2;r");
}

#[test]
fn reference_index_must_be_an_input_or_output() {
    assert!(ParameterSpecList::parse("i;i[1]").is_ok());
    assert!(ParameterSpecList::parse("i;i[2]").is_err());
    // The return does not count.
    assert!(ParameterSpecList::parse("i;r[1]").is_err());
    let err = ParameterSpecList::parse("i;o{5}").unwrap_err();
    assert_eq!(err.offset, 2);
}

// ── Dimension checks ────────────────────────────────────────────────────────

#[test]
fn exact_dimension() {
    let mut store = MemStore::new();
    let good = store.array(Float, &[2]);
    let bad = store.array(Float, &[3]);
    assert_eq!(planned_dims(&store, &[Some(good)], "i2", 0), vec![2]);

    let err = plan(&store, &[Some(bad)], &spec("i2")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
    assert_eq!(err.param(), Some(0));
    assert_eq!(err.to_string(), "parameter #1, dimension #1: expected 2, found 3");
}

#[test]
fn at_least_consumes_one_input_dimension() {
    let mut store = MemStore::new();
    let a = store.array(Float, &[5]);
    assert_eq!(planned_dims(&store, &[Some(a)], "i>3", 0), vec![3]);

    let walk = DimWalk {
        param: 0,
        kind: ParamKind::Input,
        actual: &[5, 2],
        reference: Reference::None,
    };
    let mut out = Vec::new();
    let advance = walk
        .step(DimensionOp::AtLeast(3), &Cursors::default(), &mut out)
        .unwrap();
    assert_eq!(advance, Advance { input: 1, reference: 1 });

    // The next slot sees the second dimension.
    let b = store.array(Float, &[5, 2]);
    assert_eq!(planned_dims(&store, &[Some(b)], "i>3,2", 0), vec![3, 2]);
}

#[test]
fn copied_dimension_comes_from_the_reference() {
    let mut store = MemStore::new();
    let a = store.array(Double, &[4, 5]);
    let b = store.array(Double, &[9]);
    assert_eq!(planned_dims(&store, &[Some(a), Some(b)], "i;i=", 1), vec![4]);
}

#[test]
fn return_follows_the_live_input_shape() {
    let mut store = MemStore::new();
    let mut loops = SimpleLoops::new();

    // `>1` plans the literal for the input itself only.
    let a = store.array(Float, &[5, 3]);
    let bound = bind_format(&mut store, &mut loops, &[Some(a)], "i>1*;r&").unwrap();
    assert_eq!(bound.plan().params()[0].dims, vec![1, 3]);
    let r = bound.return_value().unwrap();
    assert_eq!(store.dims_of(r), vec![5, 3]);
    assert_eq!(bound.binding(1).unwrap().dims, bound.binding(0).unwrap().dims);

    // A copied dimension does not reshape the input it was planned for.
    let b = store.array(Double, &[4, 5]);
    let c = store.array(Double, &[9]);
    let bound = bind_format(&mut store, &mut loops, &[Some(b), Some(c)], "i;i=;r&").unwrap();
    assert_eq!(bound.plan().params()[1].dims, vec![4]);
    let r = bound.return_value().unwrap();
    assert_eq!(store.dims_of(r), vec![9]);
}

#[test]
fn at_least_fixes_produced_dimensions_to_the_literal() {
    let mut store = MemStore::new();
    let a = store.array(Double, &[7]);
    assert_eq!(planned_dims(&store, &[Some(a)], "i;r>3", 1), vec![3]);

    // An existing larger output is redefined down to the literal.
    let o = store.array(Double, &[7]);
    let mut loops = SimpleLoops::new();
    let bound = bind_format(&mut store, &mut loops, &[Some(a), Some(o)], "i;o>3").unwrap();
    assert_eq!(bound.plan().params()[1].dims, vec![3]);
    assert_eq!(store.dims_of(o), vec![3]);
    assert_eq!(bound.binding(1).unwrap().value, o);
}

#[test]
fn remove_and_add_reshape_the_output() {
    let mut store = MemStore::new();
    let a = store.array(Double, &[3, 4]);
    let args = [Some(a)];
    // Replace the first reference dimension.
    assert_eq!(planned_dims(&store, &args, "i;r+2-3,=", 1), vec![2, 4]);
    // Drop it.
    assert_eq!(planned_dims(&store, &args, "i;r-,=", 1), vec![4]);
    // Add leaves the reference cursor where it was.
    assert_eq!(planned_dims(&store, &args, "i;r+7,=", 1), vec![7, 3]);

    let err = plan(&store, &args, &spec("i;r-4,=")).unwrap_err();
    assert!(matches!(err, BindError::DimensionMismatch { param: 1, expected: 4, found: 3, .. }));
}

// ── Types ───────────────────────────────────────────────────────────────────

#[test]
fn common_type_reaches_the_return() {
    let mut store = MemStore::new();
    let a = store.array(Int16, &[3]);
    let b = store.array(Double, &[3]);
    let mut loops = SimpleLoops::new();
    let bound = bind_format(&mut store, &mut loops, &[Some(a), Some(b)], "i^;i^&;r^&").unwrap();
    assert_eq!(bound.plan().common_type(), Some(Double));
    let r = bound.return_value().unwrap();
    assert_eq!(store.type_of(r), Some(Double));
    // The narrower input was converted into a fresh value.
    let first = bound.binding(0).unwrap();
    assert_eq!(first.ty, Double);
    assert_ne!(first.value, a);
    assert_eq!(store.type_of(a), Some(Int16));
}

#[test]
fn force_integer_maps_floating_inputs() {
    let mut store = MemStore::new();
    let f = store.array(Float, &[2]);
    let d = store.array(Double, &[2]);
    let w = store.array(Int16, &[2]);
    let ty = |store: &MemStore, v| plan(store, &[Some(v)], &spec("i~")).unwrap().params()[0].ty;
    assert_eq!(ty(&store, f), Some(Int32));
    assert_eq!(ty(&store, d), Some(Int64));
    assert_eq!(ty(&store, w), Some(Int16));
}

// ── Axes ────────────────────────────────────────────────────────────────────

#[test]
fn axis_argument_drops_reference_dimensions() {
    let mut store = MemStore::new();
    let a = store.array(Float, &[3, 4, 5]);
    let axis = store.integers(&[1]);
    let o = store.undefined();
    let mut loops = SimpleLoops::new();
    let bound = bind_format(
        &mut store,
        &mut loops,
        &[Some(a), Some(axis), Some(o)],
        "i;i;o[0]{1}&",
    )
    .unwrap();
    assert_eq!(bound.plan().params()[2].dims, vec![3, 5]);
    assert_eq!(store.dims_of(o), vec![3, 5]);
    assert_eq!(store.type_of(o), Some(Float));
}

// ── Outputs ─────────────────────────────────────────────────────────────────

#[test]
fn rebinding_an_output_reuses_its_storage() {
    let mut store = MemStore::new();
    let a = store.array(Float, &[4, 2]);
    let o = store.undefined();
    let list = spec("i;o&");
    let mut loops = SimpleLoops::new();

    bind(&mut store, &mut loops, &[Some(a), Some(o)], &list).unwrap();
    let after_first = store.allocations();
    let data = store.data_of(o);

    let bound = bind(&mut store, &mut loops, &[Some(a), Some(o)], &list).unwrap();
    assert_eq!(store.allocations(), after_first);
    assert_eq!(store.data_of(o), data);
    assert_eq!(bound.binding(1).unwrap().value, o);
    assert_eq!(store.dims_of(o), vec![4, 2]);
}

#[test]
fn reference_to_a_later_output_is_rejected() {
    let mut store = MemStore::new();
    let o1 = store.undefined();
    let o2 = store.array(Float, &[7]);
    for format in ["o[1]&;oF", "oF[1]2;oF"] {
        let err = plan(&store, &[Some(o1), Some(o2)], &spec(format)).unwrap_err();
        assert_eq!(err, BindError::ForwardReference { param: 0, reference: 1 }, "{format}");
        assert_eq!(err.kind(), ErrorKind::Reference);
    }
}

#[test]
fn arity_is_checked_before_anything_else() {
    let mut store = MemStore::new();
    let mut loops = SimpleLoops::new();
    let err = bind_format(&mut store, &mut loops, &[None, None, None], "i;o?").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arity);
    assert_eq!(err.to_string(), "expected between 1 and 2 arguments, found 3");
}
