use approx::assert_relative_eq;
use corr3d::geometry::rotation::{axis_angle_to_rotation, rotation_about_z, rotation_distance};
use corr3d::geometry::{Affine2, GeometryError, RigidTransform3};
use corr3d::peak::{MarkerLocalizationParams, VolumeView};
use corr3d::rigid::{Find32Params, RigidError};
use corr3d::{
    compose, correlate, correlate_2d, inverse_transform, refine_markers_3d, CorrelationError,
    CorrelationMode, CorrelationParams,
};
use nalgebra::{Matrix2, Vector2, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};

const MARKERS: [[f64; 3]; 5] = [
    [12.0, 40.0, 3.0],
    [55.0, 18.0, 9.0],
    [33.0, 71.0, 15.0],
    [80.0, 62.0, 6.0],
    [20.0, 90.0, 12.0],
];

fn ground_truth() -> Result<RigidTransform3, GeometryError> {
    Ok(RigidTransform3::new(
        axis_angle_to_rotation(&[0.1, 0.3, 1.0], 0.5)?,
        4.2,
        Vector3::new(150.0, -80.0, 0.0),
    ))
}

#[test]
fn square_rotated_30_degrees_scale_2() -> Result<(), Box<dyn std::error::Error>> {
    let square = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    let truth = RigidTransform3::new(rotation_about_z(30f64.to_radians()), 2.0, Vector3::zeros());
    let projected = truth.project_points(&square);

    for num_runs in [1, 10] {
        let params = CorrelationParams::default()
            .with_find32(Find32Params::default().with_num_runs(num_runs));
        let result = correlate(&square, &projected, &[], &params, None)?;

        assert!(result.rms_error < 1e-6);
        assert!(result.fit.success);
        assert_relative_eq!(result.transform.scale, 2.0, epsilon = 1e-6);
        assert!(rotation_distance(&result.transform.rotation, &truth.rotation) < 1e-5);
        for delta in &result.residuals {
            assert!(delta[0].abs() < 1e-6 && delta[1].abs() < 1e-6);
        }
    }
    Ok(())
}

#[test]
fn spots_follow_the_markers() -> Result<(), Box<dyn std::error::Error>> {
    let truth = ground_truth()?;
    let markers_2d = truth.project_points(&MARKERS);
    let spots = [[40.0, 50.0, 7.0], [70.0, 30.0, 11.0]];

    let params = CorrelationParams::default()
        .with_find32(Find32Params::default().with_num_runs(4).with_seed(3))
        .with_mode(CorrelationMode::MoveOverview);
    let result = correlate(&MARKERS, &markers_2d, &spots, &params, None)?;

    assert_eq!(result.mode, CorrelationMode::MoveOverview);
    assert_eq!(result.transformed_markers.len(), MARKERS.len());
    assert_eq!(result.residuals.len(), MARKERS.len());
    assert!(result.rms_error < 1e-4);

    let expected = truth.project_points(&spots);
    for (p, q) in result.projected_spots.iter().zip(&expected) {
        assert_relative_eq!(p[0], q[0], epsilon = 1e-3);
        assert_relative_eq!(p[1], q[1], epsilon = 1e-3);
    }

    let back = inverse_transform(&result.transform, &result.transformed_spots)?;
    for (p, q) in back.iter().zip(&spots) {
        for k in 0..3 {
            assert_relative_eq!(p[k], q[k], epsilon = 1e-8);
        }
    }
    Ok(())
}

#[test]
fn more_restarts_are_never_worse_on_noisy_markers() -> Result<(), Box<dyn std::error::Error>> {
    let truth = ground_truth()?;
    let mut rng = StdRng::seed_from_u64(11);
    let noisy: Vec<[f64; 2]> = truth
        .project_points(&MARKERS)
        .into_iter()
        .map(|p| [p[0] + rng.random_range(-0.5..0.5), p[1] + rng.random_range(-0.5..0.5)])
        .collect();

    let mut previous = f64::INFINITY;
    for num_runs in [1, 3, 9] {
        let params = CorrelationParams::default()
            .with_find32(Find32Params::default().with_num_runs(num_runs).with_seed(5));
        let result = correlate(&MARKERS, &noisy, &[], &params, None)?;
        assert!(result.rms_error <= previous);
        assert_eq!(result.fit.num_runs, num_runs);
        previous = result.rms_error;
    }
    assert!(previous < 1.0);
    Ok(())
}

#[test]
fn translation_about_rotation_centers() -> Result<(), Box<dyn std::error::Error>> {
    let truth = ground_truth()?;
    let markers_2d = truth.project_points(&MARKERS);
    let c1 = [10.0, 20.0, 5.0];
    let c2 = [-30.0, 45.0, 2.0];

    let base = CorrelationParams::default().with_find32(Find32Params::default().with_num_runs(2));
    let origin = correlate(
        &MARKERS,
        &markers_2d,
        &[],
        &base.clone().with_rotation_center(Some([0.0; 3])),
        None,
    )?;
    assert_eq!(origin.translation_about_center, Some(origin.transform.translation));

    let about_c1 = correlate(
        &MARKERS,
        &markers_2d,
        &[],
        &base.clone().with_rotation_center(Some(c1)),
        None,
    )?;
    let t1 = about_c1
        .translation_about_center
        .ok_or("missing re-based translation")?;

    // moving the center from c1 to c2 on the re-based translation
    let gl = about_c1.transform.gl();
    let shift = Vector3::new(c2[0] - c1[0], c2[1] - c1[1], c2[2] - c1[2]);
    let t2_composed = t1 + (gl - nalgebra::Matrix3::identity()) * shift;

    // fitting markers expressed relative to c2
    let shifted_3d: Vec<[f64; 3]> = MARKERS
        .iter()
        .map(|p| [p[0] - c2[0], p[1] - c2[1], p[2] - c2[2]])
        .collect();
    let shifted_2d: Vec<[f64; 2]> = markers_2d
        .iter()
        .map(|p| [p[0] - c2[0], p[1] - c2[1]])
        .collect();
    let refit = correlate(&shifted_3d, &shifted_2d, &[], &base, None)?;

    assert_relative_eq!(refit.transform.translation.x, t2_composed.x, epsilon = 1e-4);
    assert_relative_eq!(refit.transform.translation.y, t2_composed.y, epsilon = 1e-4);
    Ok(())
}

#[test]
fn rigid_then_affine_composition() -> Result<(), Box<dyn std::error::Error>> {
    let rigid = ground_truth()?;
    let overview_to_search = Affine2::new(
        Matrix2::new(0.8, -0.1, 0.05, 1.1),
        Vector2::new(-20.0, 35.0),
    );
    let composed = compose(&rigid, &overview_to_search);

    let direct = composed.transform_points(&MARKERS);
    let staged = overview_to_search.transform_points(&rigid.project_points(&MARKERS));
    for (p, q) in direct.iter().zip(&staged) {
        assert_relative_eq!(p[0], q[0], epsilon = 1e-9);
        assert_relative_eq!(p[1], q[1], epsilon = 1e-9);
    }
    Ok(())
}

#[test]
fn overview_to_search_affine() -> Result<(), Box<dyn std::error::Error>> {
    let truth = Affine2::new(Matrix2::new(1.5, 0.3, -0.2, -1.4), Vector2::new(7.0, -3.0));
    let src = [[0.0, 0.0], [100.0, 10.0], [30.0, 80.0], [90.0, 95.0]];
    let dst = truth.transform_points(&src);
    let spots = [[50.0, 50.0]];

    let result = correlate_2d(&src, &dst, &spots, CorrelationMode::Collage)?;
    assert!(result.rms_error < 1e-9);
    assert!(result.decomposition.parity);
    assert_relative_eq!(result.transform.gl, truth.gl, epsilon = 1e-9);
    let expected = truth.transform_point(&spots[0]);
    assert_relative_eq!(result.transformed_spots[0][0], expected[0], epsilon = 1e-8);
    assert_relative_eq!(result.transformed_spots[0][1], expected[1], epsilon = 1e-8);
    Ok(())
}

#[test]
fn underdetermined_inputs_are_reported() {
    let two = [[0.0, 0.0], [1.0, 1.0]];
    assert!(matches!(
        correlate_2d(&two, &two, &[], CorrelationMode::MoveSearch),
        Err(CorrelationError::Geometry(
            GeometryError::SingularConfiguration { .. }
        ))
    ));

    assert!(matches!(
        correlate(
            &MARKERS[..2],
            &two,
            &[],
            &CorrelationParams::default(),
            None
        ),
        Err(CorrelationError::Rigid(
            RigidError::DegenerateConfiguration { .. }
        ))
    ));
}

#[test]
fn markers_refined_in_a_volume_then_correlated() -> Result<(), Box<dyn std::error::Error>> {
    let (nx, ny, nz) = (48usize, 48usize, 16usize);
    let centers = [
        [10.3, 12.6, 4.0],
        [35.7, 9.2, 8.0],
        [22.4, 36.1, 11.0],
        [40.2, 38.8, 6.0],
    ];
    let mut data = vec![5.0f32; nx * ny * nz];
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let mut value = 0.0;
                for c in &centers {
                    let d2 = (x as f64 - c[0]).powi(2) + (y as f64 - c[1]).powi(2);
                    let dz2 = (z as f64 - c[2]).powi(2);
                    value += 300.0 * (-d2 / (2.0 * 1.5f64.powi(2)) - dz2 / 2.0).exp();
                }
                data[(z * ny + y) * nx + x] += value as f32;
            }
        }
    }
    let volume = VolumeView::new(&data, nx, ny, nz)?;
    let seeds: Vec<[usize; 3]> = centers
        .iter()
        .map(|c| [c[0].round() as usize, c[1].round() as usize, c[2] as usize])
        .collect();

    let refined = refine_markers_3d(&volume, &seeds, &MarkerLocalizationParams::default())?;
    for (r, c) in refined.iter().zip(&centers) {
        assert_relative_eq!(r[0], c[0], epsilon = 0.02);
        assert_relative_eq!(r[1], c[1], epsilon = 0.02);
        assert_relative_eq!(r[2], c[2], epsilon = 0.02);
    }

    let truth = ground_truth()?;
    let markers_2d = truth.project_points(&centers);
    let result = correlate(&refined, &markers_2d, &[], &CorrelationParams::default(), None)?;
    assert!(result.rms_error < 0.5);
    Ok(())
}

#[test]
fn params_round_trip_through_json() -> Result<(), Box<dyn std::error::Error>> {
    let params = CorrelationParams::default()
        .with_rotation_center(Some([1.0, 2.0, 3.0]))
        .with_mode(CorrelationMode::Collage)
        .with_find32(Find32Params::default().with_num_runs(7).with_seed(99));
    let json = serde_json::to_string(&params)?;
    let back: CorrelationParams = serde_json::from_str(&json)?;
    assert_eq!(back.mode, CorrelationMode::Collage);
    assert_eq!(back.rotation_center, Some([1.0, 2.0, 3.0]));
    assert_eq!(back.find32.num_runs, 7);
    assert_eq!(back.find32.seed, 99);
    Ok(())
}
