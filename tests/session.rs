use std::collections::HashMap;

use geo_types::{LineString, Polygon};
use stickernest::export::layout_svg;
use stickernest::{BinSpec, NestConfig, NestError, NestShape, Progress, Stage, run_nest};

fn rect(w: f64, h: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]),
        vec![],
    )
}

fn shape(id: u32, polygon: Polygon<f64>, count: usize) -> NestShape {
    NestShape {
        shape_id: id,
        path: None,
        polygon,
        count,
    }
}

fn seeded_config(seed: u64) -> NestConfig {
    NestConfig {
        num_generations: 4,
        population_size: 6,
        mutation_rate: 30,
        rotations: 4,
        n_workers: 4,
        seed: Some(seed),
    }
}

#[test]
fn identical_seeds_reproduce_the_layout() {
    let shapes = [
        shape(1, rect(100.0, 100.0), 2),
        shape(
            2,
            Polygon::new(
                LineString::from(vec![(0.0, 0.0), (80.0, 0.0), (40.0, 60.0)]),
                vec![],
            ),
            1,
        ),
    ];
    let bin = BinSpec::new(400.0, 300.0);

    let first = run_nest(&shapes, bin, &seeded_config(42), None).unwrap();
    let second = run_nest(&shapes, bin, &seeded_config(42), None).unwrap();
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn every_requested_copy_is_accounted_for() {
    let shapes = [
        shape(1, rect(80.0, 80.0), 3),
        shape(2, rect(150.0, 90.0), 2),
    ];
    let layout = run_nest(&shapes, BinSpec::new(200.0, 100.0), &seeded_config(7), None).unwrap();

    let mut counts: HashMap<u32, usize> = HashMap::new();
    for placement in layout.bins.iter().flatten() {
        *counts.entry(placement.shape_id).or_default() += 1;
    }
    let placed: usize = counts.values().sum();
    assert_eq!(placed + layout.unplaced, 5);
    for (&id, &count) in &counts {
        let requested = shapes.iter().find(|s| s.shape_id == id).unwrap().count;
        assert!(count <= requested, "shape {id} placed {count} times");
    }
}

#[test]
fn progress_reports_every_generation() {
    use std::sync::Mutex;

    let events: Mutex<Vec<Progress>> = Mutex::new(Vec::new());
    let callback = |p: Progress| events.lock().unwrap().push(p);

    let shapes = [shape(1, rect(50.0, 50.0), 2)];
    run_nest(
        &shapes,
        BinSpec::new(200.0, 200.0),
        &seeded_config(1),
        Some(&callback),
    )
    .unwrap();

    let events = events.into_inner().unwrap();
    let generations: Vec<usize> = events
        .iter()
        .filter(|p| p.stage == Stage::Generations)
        .map(|p| p.index)
        .collect();
    assert_eq!(generations, vec![1, 2, 3, 4]);
    assert!(events.iter().all(|p| p.total == 4));
}

#[test]
fn invalid_inputs_fail_before_the_search() {
    let bin = BinSpec::new(200.0, 200.0);
    let cfg = seeded_config(1);

    assert!(matches!(
        run_nest(&[], bin, &cfg, None),
        Err(NestError::InvalidInput(_))
    ));

    let mut bad_params = cfg;
    bad_params.population_size = 1;
    assert!(matches!(
        run_nest(&[shape(1, rect(10.0, 10.0), 1)], bin, &bad_params, None),
        Err(NestError::InvalidInput(_))
    ));

    assert!(matches!(
        run_nest(
            &[shape(1, rect(10.0, 10.0), 1)],
            BinSpec::new(-5.0, 100.0),
            &cfg,
            None
        ),
        Err(NestError::InvalidInput(_))
    ));
}

#[test]
fn layouts_render_to_svg() {
    let shapes = [shape(1, rect(60.0, 60.0), 2)];
    let bin = BinSpec::new(200.0, 100.0);
    let layout = run_nest(&shapes, bin, &seeded_config(3), None).unwrap();

    let outlines = HashMap::from([(1, rect(60.0, 60.0))]);
    let docs = layout_svg(&layout, &outlines, bin);
    assert_eq!(docs.len(), layout.bins.len());
    let polygons: usize = docs.iter().map(|d| d.matches("<polygon").count()).sum();
    assert_eq!(polygons, 2);
}
