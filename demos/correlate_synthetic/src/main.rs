use argh::FromArgs;
use corr3d::geometry::rotation::axis_angle_to_rotation;
use corr3d::geometry::{EulerConvention, RigidTransform3};
use corr3d::optim::CancellationToken;
use corr3d::rigid::{Find32Params, InitialRotation, RotationMode, ScaleMode};
use corr3d::{correlate, CorrelationMode, CorrelationParams};
use nalgebra::Vector3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Correlates synthetic 3D markers with their noisy 2D projections
#[derive(Debug, FromArgs)]
struct Args {
    /// number of markers
    #[argh(option, short = 'n', default = "6")]
    num_markers: usize,

    /// number of optimization runs
    #[argh(option, short = 'r', default = "10")]
    num_runs: usize,

    /// standard deviation of the 2D marker noise in pixels
    #[argh(option, default = "0.5")]
    noise: f64,

    /// rotation angle of the ground truth in degrees
    #[argh(option, default = "35.0")]
    angle: f64,

    /// scale of the ground truth
    #[argh(option, default = "3.5")]
    scale: f64,

    /// fix the scale to the ground truth instead of estimating it
    #[argh(switch)]
    fixed_scale: bool,

    /// optimize euler angles of this convention (e.g. zxz_ex, zyz_in) instead of cayley-klein parameters
    #[argh(option, from_str_fn(to_euler_convention))]
    euler: Option<EulerConvention>,

    /// seed the first run from a 2D affine fit
    #[argh(switch)]
    affine_seed: bool,

    /// correlation mode: "move search", "move overview" or "collage"
    #[argh(option, default = "CorrelationMode::MoveSearch")]
    mode: CorrelationMode,

    /// random seed
    #[argh(option, default = "0")]
    seed: u64,

    /// print the full result as json
    #[argh(switch)]
    json: bool,
}

fn to_euler_convention(value: &str) -> Result<EulerConvention, String> {
    value.parse()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    // cancel the running correlation on Ctrl-C
    let cancel = CancellationToken::new();
    ctrlc::set_handler({
        let cancel = cancel.clone();
        move || {
            println!("Received Ctrl-C signal. Cancelling the correlation !!");
            cancel.cancel();
        }
    })?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let noise = Normal::new(0.0, args.noise)?;
    let truth = RigidTransform3::new(
        axis_angle_to_rotation(&[0.3, -0.2, 1.0], args.angle.to_radians())?,
        args.scale,
        Vector3::new(512.0, 384.0, 0.0),
    );

    let markers_3d: Vec<[f64; 3]> = (0..args.num_markers)
        .map(|_| {
            [
                rng.random_range(0.0..100.0),
                rng.random_range(0.0..100.0),
                rng.random_range(0.0..30.0),
            ]
        })
        .collect();
    let markers_2d: Vec<[f64; 2]> = truth
        .project_points(&markers_3d)
        .into_iter()
        .map(|p| {
            [
                p[0] + noise.sample(&mut rng),
                p[1] + noise.sample(&mut rng),
            ]
        })
        .collect();
    let spots = [[50.0, 50.0, 15.0]];

    let mut find32 = Find32Params::default()
        .with_num_runs(args.num_runs)
        .with_seed(args.seed);
    if args.fixed_scale {
        find32 = find32.with_scale(ScaleMode::Fixed(args.scale));
    }
    if let Some(convention) = args.euler {
        find32 = find32.with_rotation_mode(RotationMode::Euler(convention));
    }
    if args.affine_seed {
        find32 = find32.with_initial_rotation(InitialRotation::FromAffine2D);
    }
    let params = CorrelationParams::default()
        .with_find32(find32)
        .with_rotation_center(Some([50.0, 50.0, 15.0]))
        .with_mode(args.mode);

    let result = correlate(&markers_3d, &markers_2d, &spots, &params, Some(&cancel))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let euler = result
        .transform
        .euler_angles(EulerConvention::ZXZ_EXTRINSIC)
        .to_degrees();
    println!("mode:              {}", result.mode);
    println!(
        "best run:          {} of {} (status {}, success {})",
        result.fit.best_run, result.fit.num_runs, result.fit.status, result.fit.success
    );
    println!("rms error:         {:.4} px", result.rms_error);
    println!("scale:             {:.4} (truth {:.4})", result.transform.scale, args.scale);
    println!(
        "euler zxz_ex [deg]: [{:.3}, {:.3}, {:.3}]",
        euler[0], euler[1], euler[2]
    );
    println!("translation:       {:?}", result.transform.translation.as_slice());
    if let Some(t) = result.translation_about_center {
        println!("translation about center: {:?}", t.as_slice());
    }
    for (marker, delta) in result.residuals.iter().enumerate() {
        println!("marker {marker}: delta [{:+.3}, {:+.3}]", delta[0], delta[1]);
    }
    for (spot, p) in spots.iter().zip(&result.projected_spots) {
        println!("spot {spot:?} -> [{:.2}, {:.2}]", p[0], p[1]);
    }
    Ok(())
}
