//! Write archives, read them back and compare.

mod common;

use std::sync::Arc;

use alembic::core::PropertyType;
use alembic::prelude::*;
use alembic::util::Bool;
use half::f16;
use tempfile::NamedTempFile;

fn same_node<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

#[test]
fn test_roundtrip_hierarchy() {
    common::init_tracing();
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    {
        let archive = OArchive::create(temp.path()).expect("Failed to create archive");
        let top = archive.top().unwrap();
        let mut md = MetaData::new();
        md.set("schema", "Test_Group_v1");
        let parent = top.create_child_with("parent", md).unwrap();
        parent.create_child("nested").unwrap();
        top.create_child("sibling").unwrap();
        assert_eq!(top.num_children(), 2);
        archive.finalize().expect("Failed to finalize");
    }

    let archive = IArchive::open(temp.path()).expect("Failed to open archive");
    let top = archive.top().unwrap();
    assert!(top.is_top());
    assert_eq!(top.name(), "ABC");
    assert_eq!(top.full_name(), "/");
    assert_eq!(top.num_children(), 2);

    let names: Vec<String> = top.children().map(|c| c.unwrap().name().to_string()).collect();
    assert_eq!(names, ["parent", "sibling"]);

    let parent = top.child_by_name("parent").unwrap().expect("Could not find 'parent'");
    assert!(parent.matches_schema("Test_Group_v1"));
    assert_eq!(parent.child_header(0).unwrap().full_name, "/parent/nested");

    let nested = archive.find_object("/parent/nested").unwrap().expect("Could not find nested");
    assert_eq!(nested.full_name(), "/parent/nested");
    assert_eq!(nested.parent().unwrap().name(), "parent");
    assert_eq!(nested.num_children(), 0);
    assert!(archive.find_object("parent/missing").unwrap().is_none());
    assert!(top.child_by_name("missing").unwrap().is_none());
    assert!(matches!(top.child(2), Err(Error::ChildOutOfBounds { index: 2, count: 2 })));

    archive.verify().expect("Stored hashes should match");
}

#[test]
fn test_roundtrip_scalars() {
    let archive = common::write_and_read(WriteOptions::default(), |out| {
        let props = out.top()?.create_child("values")?.properties()?;
        let count = props.create_scalar("count", DataType::INT32, 0)?;
        let weight = props.create_scalar("weight", DataType::FLOAT64, 0)?;
        let half = props.create_scalar("half", DataType::FLOAT16, 0)?;
        let flag = props.create_scalar("flag", DataType::BOOL, 0)?;
        let pos = props.create_scalar("pos", DataType::VEC3F, 0)?;
        let label = props.create_scalar("label", DataType::STRING, 0)?;
        let wide = props.create_scalar("wide", DataType::WSTRING, 0)?;
        for i in 0..3 {
            count.set(i * 10)?;
            weight.set(0.25 * i as f64)?;
            half.set(f16::from_f32(i as f32))?;
            flag.set(Bool::new(i % 2 == 1))?;
            pos.set_values(&[i as f32, 0.0, -(i as f32)])?;
            label.set_string(&format!("frame {i}"))?;
            wide.set_string("naïve ☃")?;
        }
        Ok(())
    })
    .expect("Round trip failed");

    let props = archive.find_object("/values").unwrap().unwrap().properties().unwrap();
    assert_eq!(props.num_properties(), 7);
    assert_eq!(props.property_names(), ["count", "weight", "half", "flag", "pos", "label", "wide"]);

    let count = props.scalar("count").unwrap().unwrap();
    assert_eq!(count.num_samples(), 3);
    assert!(!count.is_constant());
    assert_eq!(count.get::<i32>(2).unwrap(), 20);
    assert!(matches!(count.get::<f32>(0), Err(Error::TypeMismatch { .. })));
    assert!(matches!(count.get::<i32>(3), Err(Error::SampleOutOfBounds { .. })));

    assert_eq!(props.scalar("weight").unwrap().unwrap().get::<f64>(1).unwrap(), 0.25);
    assert_eq!(props.scalar("half").unwrap().unwrap().get::<f16>(2).unwrap(), f16::from_f32(2.0));
    assert!(props.scalar("flag").unwrap().unwrap().get::<Bool>(1).unwrap().get());

    let pos = props.scalar("pos").unwrap().unwrap();
    assert_eq!(pos.data_type(), DataType::VEC3F);
    assert!(pos.get::<f32>(0).is_err());
    assert_eq!(pos.get_values::<f32>(2).unwrap(), [2.0, 0.0, -2.0]);

    assert_eq!(props.scalar("label").unwrap().unwrap().get_string(1).unwrap(), "frame 1");
    let wide = props.scalar("wide").unwrap().unwrap();
    assert!(wide.is_constant());
    assert_eq!(wide.get_string(2).unwrap(), "naïve ☃");

    assert!(matches!(props.array("count"), Err(Error::TypeMismatch { .. })));
    assert!(props.scalar("nothing").unwrap().is_none());
}

#[test]
fn test_roundtrip_arrays() {
    let archive = common::write_and_read(WriteOptions::default(), |out| {
        let props = out.top()?.properties()?;
        let points = props.create_array("P", DataType::VEC3F, 0)?;
        points.set_array(&[0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0])?;
        points.set_array(&[0.0f32, 1.0, 0.0, 1.0, 1.0, 0.0, 0.5, 0.5, 1.0])?;
        points.set_array::<f32>(&[])?;

        let grid = props.create_array("grid", DataType::UINT16, 0)?;
        grid.set_shaped(Dimensions::from_slice(&[3, 2]), &[1u16, 2, 3, 4, 5, 6])?;

        let names = props.create_array("names", DataType::STRING, 0)?;
        names.set_strings(&["a", "", "ccc"])?;

        let flags = props.create_array("flags", DataType::BOOL, 0)?;
        flags.set_array(&[Bool::TRUE, Bool::FALSE])?;
        Ok(())
    })
    .expect("Round trip failed");

    let props = archive.top().unwrap().properties().unwrap();
    let points = props.array("P").unwrap().unwrap();
    assert_eq!(points.num_samples(), 3);
    assert_eq!(points.header().property_type, PropertyType::Array);
    assert_eq!(points.get_array::<f32>(0).unwrap().len(), 6);
    assert_eq!(points.get_array::<f32>(1).unwrap()[6..], [0.5, 0.5, 1.0]);
    assert_eq!(points.dimensions(1).unwrap(), Dimensions::d1(3));
    assert!(points.get_array::<f32>(2).unwrap().is_empty());
    assert_eq!(points.dimensions(2).unwrap().num_points(), 0);
    assert!(!points.is_homogenous());

    let grid = props.array("grid").unwrap().unwrap();
    assert_eq!(grid.dimensions(0).unwrap().sizes(), &[3, 2]);
    assert_eq!(grid.get_array::<u16>(0).unwrap(), [1, 2, 3, 4, 5, 6]);
    assert!(matches!(grid.get_array::<i16>(0), Err(Error::TypeMismatch { .. })));

    let names = props.array("names").unwrap().unwrap();
    assert_eq!(names.get_strings(0).unwrap(), ["a", "", "ccc"]);
    assert_eq!(names.dimensions(0).unwrap(), Dimensions::d1(3));

    let flags = props.array("flags").unwrap().unwrap();
    assert_eq!(flags.get_array::<Bool>(0).unwrap(), [Bool::TRUE, Bool::FALSE]);
    assert!(flags.is_constant());
}

#[test]
fn test_roundtrip_metadata() {
    let archive = common::write_and_read(WriteOptions::new().application_writer("unit test"), |out| {
        out.set_description("round trip")?;
        out.set_dcc_fps(24.0)?;
        out.set_archive_metadata("studio", "nowhere")?;

        let mut md = MetaData::new();
        md.set("interpretation", "point");
        let props = out.top()?.properties()?;
        props.create_array_with("P", DataType::VEC3F, md.clone(), 0)?;
        let sub = props.create_compound_with(".geom", md)?;
        sub.create_scalar("inner", DataType::UINT8, 0)?.set(7u8)?;
        Ok(())
    })
    .expect("Round trip failed");

    assert_eq!(archive.app_name(), Some("unit test"));
    assert_eq!(archive.user_description(), Some("round trip"));
    assert_eq!(archive.dcc_fps(), Some(24.0));
    assert_eq!(archive.archive_metadata().get("studio"), Some("nowhere"));
    assert!(archive.alembic_version().unwrap().starts_with("Alembic 1.8.10"));
    assert_eq!(archive.reader().indexed_metadata().len(), 2);

    let props = archive.top().unwrap().properties().unwrap();
    assert_eq!(props.property_header(0).unwrap().meta_data.get("interpretation"), Some("point"));
    let geom = props.compound(".geom").unwrap().unwrap();
    assert_eq!(geom.header().meta_data.get("interpretation"), Some("point"));
    let inner = geom.scalar("inner").unwrap().unwrap();
    assert_eq!(inner.get::<u8>(0).unwrap(), 7);

    // a property with no samples
    let empty = props.array("P").unwrap().unwrap();
    assert_eq!(empty.num_samples(), 0);
    assert!(empty.sample(0).is_err());
}

#[test]
fn test_readers_share_live_nodes() {
    let archive = common::write_and_read(WriteOptions::default(), |out| {
        let child = out.top()?.create_child("a")?;
        child.properties()?.create_scalar("s", DataType::INT64, 0)?.set(5i64)?;
        Ok(())
    })
    .unwrap();

    let top = archive.top().unwrap();
    let first = top.child(0).unwrap();
    let again = top.child_by_name("a").unwrap().unwrap();
    assert!(same_node(first.as_reader(), again.as_reader()));
    assert!(same_node(
        first.properties().unwrap().as_reader(),
        again.properties().unwrap().as_reader()
    ));

    // a child keeps its ancestors alive
    drop((top, again));
    let archive_name = archive.name().to_string();
    drop(archive);
    assert_eq!(first.parent().unwrap().full_name(), "/");
    assert_eq!(first.as_reader().archive().name(), archive_name);
    let value = first.properties().unwrap().scalar("s").unwrap().unwrap();
    assert_eq!(value.get::<i64>(0).unwrap(), 5);
}
