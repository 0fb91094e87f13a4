use ifu_reduce::{sky_mask, sky_spectrum, subtract_sky, SkyRegion};
use ndarray::{Array1, Array3};

#[test]
fn regions_parse_from_parameter_lists() {
    let regions: Vec<SkyRegion> =
        serde_yaml::from_str("- [2, 3, 1.5]\n- [0, 0, 1, 2]\n").expect("regions");
    assert_eq!(regions[0], SkyRegion::Circle { x: 2.0, y: 3.0, r: 1.5 });
    assert_eq!(regions[1], SkyRegion::Box { x: 0, y: 0, dx: 1, dy: 2 });
    assert!(serde_yaml::from_str::<Vec<SkyRegion>>("- [1, 2]\n").is_err());
    assert!(serde_yaml::from_str::<Vec<SkyRegion>>("- [0.5, 0, 1, 1]\n").is_err());
}

#[test]
fn box_is_inclusive_and_circle_is_radial() {
    let mask = sky_mask(&[SkyRegion::Box { x: 1, y: 0, dx: 1, dy: 1 }], 4, 4);
    let flagged: Vec<(usize, usize)> = mask
        .indexed_iter()
        .filter(|(_, f)| **f)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(flagged, vec![(0, 1), (0, 2), (1, 1), (1, 2)]);

    let mask = sky_mask(&[SkyRegion::Circle { x: 2.0, y: 2.0, r: 1.0 }], 5, 5);
    assert_eq!(mask.iter().filter(|f| **f).count(), 5);
    assert!(mask[[2, 2]] && mask[[1, 2]] && !mask[[1, 1]]);
}

#[test]
fn median_sky_is_removed_from_every_spaxel() {
    let mut data = Array3::from_elem((2, 2, 3), 10.0);
    data[[0, 0, 0]] = 1.0;
    data[[0, 0, 1]] = 3.0;
    data[[0, 0, 2]] = f64::NAN;
    let mask = sky_mask(&[SkyRegion::Box { x: 0, y: 0, dx: 2, dy: 0 }], 2, 3);
    let sky = sky_spectrum(data.view(), &mask).expect("sky");
    assert_eq!(sky, Array1::from(vec![2.0, 10.0]));
    let cleaned = subtract_sky(data.view(), &sky).expect("subtract");
    assert_eq!(cleaned[[0, 1, 0]], 8.0);
    assert_eq!(cleaned[[1, 1, 2]], 0.0);
}

#[test]
fn empty_sky_mask_is_a_config_error() {
    let data = Array3::from_elem((1, 2, 2), 0.0);
    let mask = sky_mask(&[SkyRegion::Box { x: 5, y: 5, dx: 0, dy: 0 }], 2, 2);
    let err = sky_spectrum(data.view(), &mask).expect_err("empty");
    assert_eq!(err.info().code, "sky-empty");
}

#[test]
fn oversized_box_clips_to_the_field() {
    let regions: Vec<SkyRegion> =
        serde_yaml::from_str("- [1, 1, 1.0e30, 1.0e30]\n").expect("regions");
    let mask = sky_mask(&regions, 3, 4);
    assert_eq!(mask.iter().filter(|f| **f).count(), 6);
    assert!(!mask[[0, 0]] && mask[[2, 3]]);

    let mask = sky_mask(
        &[SkyRegion::Box { x: 0, y: usize::MAX, dx: 0, dy: usize::MAX }],
        3,
        4,
    );
    assert!(mask.iter().all(|f| !*f));
}
