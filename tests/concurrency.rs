//! Reading one archive from many threads at once.

mod common;

use std::thread;

use alembic::prelude::*;
use rayon::prelude::*;
use tempfile::NamedTempFile;

const OBJECTS: usize = 16;
const SAMPLES: usize = 8;

fn expected(object: usize, sample: usize) -> Vec<u32> {
    (0..64).map(|i| (object * 1000 + sample * 100 + i) as u32).collect()
}

fn write_scene(path: &std::path::Path) {
    let archive = OArchive::create(path).expect("Failed to create archive");
    let top = archive.top().unwrap();
    for object in 0..OBJECTS {
        let child = top.create_child(&format!("obj{object}")).unwrap();
        let prop = child.properties().unwrap().create_array("ids", DataType::UINT32, 0).unwrap();
        for sample in 0..SAMPLES {
            prop.set_array(&expected(object, sample)).unwrap();
        }
    }
    archive.finalize().expect("Failed to finalize");
}

fn check_object(archive: &IArchive, object: usize) {
    let child = archive
        .find_object(&format!("/obj{object}"))
        .unwrap()
        .expect("object missing");
    let prop = child.properties().unwrap().array("ids").unwrap().unwrap();
    assert_eq!(prop.num_samples(), SAMPLES);
    for sample in (0..SAMPLES).rev() {
        assert_eq!(prop.get_array::<u32>(sample).unwrap(), expected(object, sample));
    }
}

#[test]
fn test_threads_on_own_slots() {
    common::init_tracing();
    let temp = NamedTempFile::new().unwrap();
    write_scene(temp.path());

    for use_mmap in [false, true] {
        let threads = 4;
        let options = ReadOptions::new()
            .num_streams(threads)
            .use_mmap(use_mmap)
            .verify_sample_keys(true);
        let archive = IArchive::open_with(temp.path(), &options).unwrap();

        thread::scope(|scope| {
            for t in 0..threads {
                let archive = archive.clone();
                scope.spawn(move || {
                    for object in (t..OBJECTS).step_by(threads) {
                        check_object(&archive, object);
                    }
                });
            }
        });
        assert_eq!(archive.reader().stream_manager().num_free(), threads);
    }
}

#[test]
fn test_more_threads_than_slots() {
    let temp = NamedTempFile::new().unwrap();
    write_scene(temp.path());

    let options = ReadOptions::new().num_streams(2).use_mmap(false);
    let archive = IArchive::open_with(temp.path(), &options).unwrap();
    (0..OBJECTS * 4)
        .into_par_iter()
        .for_each(|i| check_object(&archive, i % OBJECTS));
    assert_eq!(archive.reader().stream_manager().num_free(), 2);
}

#[test]
fn test_shared_nodes_across_threads() {
    let temp = NamedTempFile::new().unwrap();
    write_scene(temp.path());
    let archive = IArchive::open_with(temp.path(), &ReadOptions::new().num_streams(3)).unwrap();

    // every thread resolves the same objects while others hold them
    let top = archive.top().unwrap();
    let held: Vec<IObject> = top.children().map(|c| c.unwrap()).collect();
    let names: Vec<String> = (0..8)
        .into_par_iter()
        .flat_map_iter(|_| {
            let top = archive.top().unwrap();
            (0..OBJECTS).map(move |i| top.child(i).unwrap().full_name().to_string())
        })
        .collect();
    assert_eq!(names.len(), 8 * OBJECTS);
    assert_eq!(held.len(), OBJECTS);
    archive.verify().expect("Stored hashes should match");
}
