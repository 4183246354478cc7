//! End-to-end band math passes checked against direct per-pixel computation

use approx::{assert_abs_diff_eq, assert_relative_eq};
use rastermath_algorithms::bandmath::{BandMathError, BandMathParams, BandMathX, ExpressionOutput};
use rastermath_core::{GeoTransform, PixelType, Raster, Window};
use rastermath_parallel::{ProcessingMode, Region};

fn raster(bands: usize, rows: usize, cols: usize, f: impl Fn(usize, usize, usize) -> f64) -> Raster<f64> {
    let mut data = Vec::with_capacity(bands * rows * cols);
    for b in 0..bands {
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(b, r, c));
            }
        }
    }
    Raster::from_vec(data, bands, rows, cols).unwrap()
}

fn sequential() -> BandMathParams {
    BandMathParams {
        mode: ProcessingMode::Sequential,
        ..Default::default()
    }
}

/// Mean of the in-raster samples of a window, NaN when none is valid
fn window_mean(input: &Raster<f64>, band: usize, row: usize, col: usize, window: Window) -> f64 {
    let (rows, cols) = input.shape();
    let mut sum = 0.0;
    let mut count = 0;
    for (dr, dc) in window.offsets() {
        let r = row as isize + dr;
        let c = col as isize + dc;
        if r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols {
            sum += input.get(band, r as usize, c as usize).unwrap();
            count += 1;
        }
    }
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

fn bits(out: &ExpressionOutput) -> Vec<u64> {
    out.raster.to_f64().data().iter().map(|v| v.to_bits()).collect()
}

#[test]
fn single_band_expression_matches_pointwise() {
    let a = raster(1, 13, 17, |_, r, c| (r as f64 * 0.7 - c as f64 * 1.3).sin() * 40.0);
    let mut bm = BandMathX::new(sequential());
    bm.register_input(&a, None).unwrap();
    bm.compile("im1b1 * 2").unwrap();
    let out = bm.run().unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].raster.bands(), 1);
    assert_eq!(out[0].raster.shape(), (13, 17));
    for r in 0..13 {
        for c in 0..17 {
            assert_eq!(out[0].raster.get_f64(0, r, c), a.get(0, r, c).unwrap() * 2.0);
        }
    }
    assert!(out[0].diagnostics.is_clean());
}

#[test]
fn whole_image_addition_is_bandwise() {
    let a = raster(3, 6, 5, |b, r, c| (b * 100 + r * 10 + c) as f64);
    let b = raster(3, 6, 5, |b, r, c| (b as f64 + 1.0) * 0.5 - (r * c) as f64);
    let mut bm = BandMathX::default();
    bm.register_input(&a, None).unwrap();
    bm.register_input(&b, None).unwrap();
    bm.compile("im1 + im2").unwrap();
    let out = bm.run().unwrap();

    let raster_out = &out[0].raster;
    assert_eq!(raster_out.bands(), 3);
    for k in 0..3 {
        for r in 0..6 {
            for c in 0..5 {
                let expected = a.get(k, r, c).unwrap() + b.get(k, r, c).unwrap();
                assert_eq!(raster_out.get_f64(k, r, c), expected);
            }
        }
    }
}

#[test]
fn band_selection_is_a_permutation() {
    let a = raster(3, 4, 4, |b, r, c| (b * 1000 + r * 4 + c) as f64 + 0.25);
    let mut bm = BandMathX::default();
    bm.register_input(&a, None).unwrap();
    bm.compile("bands(im1, {1, 2, 1, 1})").unwrap();
    let out = bm.run().unwrap();

    let raster_out = &out[0].raster;
    assert_eq!(raster_out.bands(), 4);
    for (out_band, in_band) in [0, 1, 0, 0].into_iter().enumerate() {
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(raster_out.get_f64(out_band, r, c), a.get(in_band, r, c).unwrap());
            }
        }
    }
}

#[test]
fn even_neighborhoods_are_rejected() {
    let a = raster(1, 5, 5, |_, r, c| (r + c) as f64);
    let mut bm = BandMathX::default();
    bm.register_input(&a, None).unwrap();

    for text in ["mean(im1b1N2x3)", "mean(im1b1N3x4)", "mean(im1b1N0x1)"] {
        assert!(
            matches!(bm.compile(text), Err(BandMathError::InvalidNeighborhoodSize { .. })),
            "{} should be rejected",
            text
        );
    }
    assert!(bm.compile("mean(im1b1N1x1)").is_ok());
    assert!(bm.compile("mean(im1b1N5x3)").is_ok());
}

#[test]
fn neighborhood_mean_uses_valid_samples_near_edges() {
    let a = raster(2, 7, 9, |b, r, c| ((r * 9 + c) as f64).sqrt() + b as f64 * 3.0);
    let mut bm = BandMathX::new(BandMathParams {
        mode: ProcessingMode::ParallelWith(3),
        ..Default::default()
    });
    bm.register_input(&a, None).unwrap();
    bm.compile("mean(im1b1N3x3, im1b2N5x3)").unwrap();
    let out = bm.run().unwrap();

    let raster_out = &out[0].raster;
    assert_eq!(raster_out.bands(), 2);
    let w3 = Window::new(3, 3).unwrap();
    let w53 = Window::new(5, 3).unwrap();
    for r in 0..7 {
        for c in 0..9 {
            assert_relative_eq!(
                raster_out.get_f64(0, r, c),
                window_mean(&a, 0, r, c, w3),
                epsilon = 1e-12
            );
            assert_relative_eq!(
                raster_out.get_f64(1, r, c),
                window_mean(&a, 1, r, c, w53),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn results_do_not_depend_on_worker_count() {
    let a = raster(2, 23, 19, |b, r, c| ((r * 31 + c * 17 + b * 7) % 97) as f64 * 3.1 - 20.0);
    let run = |mode: ProcessingMode, tile_size: Option<usize>| {
        let mut bm = BandMathX::new(BandMathParams {
            mode,
            tile_size,
            ..Default::default()
        });
        bm.register_input(&a, Some("a")).unwrap();
        bm.declare_matrix_text("k", "{1, 2, 1; 2, 4, 2; 1, 2, 1}").unwrap();
        bm.compile_typed("mean(ab1N3x3) * 3 ; ab2 - ab2Mean", PixelType::U8)
            .unwrap();
        bm.compile_typed("conv(k, im1b1N3x3) / 16", PixelType::F32).unwrap();
        bm.compile("median(ab2N5x5) + idxX * idxY").unwrap();
        bm.run().unwrap()
    };

    let reference = run(ProcessingMode::Sequential, None);
    assert!(reference[0].diagnostics.clamped() > 0);

    for (mode, tiles) in [
        (ProcessingMode::ParallelWith(2), None),
        (ProcessingMode::ParallelWith(5), None),
        (ProcessingMode::Parallel, None),
        (ProcessingMode::ParallelWith(4), Some(6)),
        (ProcessingMode::Sequential, Some(1)),
    ] {
        let other = run(mode, tiles);
        for (x, y) in reference.iter().zip(&other) {
            assert_eq!(bits(x), bits(y), "{:?} {:?} differs on '{}'", mode, tiles, x.expression);
            assert_eq!(x.diagnostics, y.diagnostics);
        }
    }
}

#[test]
fn convolution_matches_manual_unroll() {
    let a = raster(1, 8, 6, |_, r, c| (r as f64 - 3.5) * (c as f64 + 0.5));
    let weights = vec![0.5, -1.0, 2.0, 0.25, 3.0, -0.75, 1.5, 0.0, -2.0];
    let mut bm = BandMathX::default();
    bm.register_input(&a, None).unwrap();
    bm.declare_matrix("kernel", 3, 3, weights.clone()).unwrap();
    bm.compile("conv(kernel, im1b1N3x3)").unwrap();
    let out = bm.run().unwrap();

    let window = Window::new(3, 3).unwrap();
    for r in 1..7 {
        for c in 1..5 {
            let manual: f64 = window
                .offsets()
                .zip(&weights)
                .map(|((dr, dc), w)| {
                    w * a
                        .get(0, (r as isize + dr) as usize, (c as isize + dc) as usize)
                        .unwrap()
                })
                .sum();
            assert_relative_eq!(out[0].raster.get_f64(0, r, c), manual, epsilon = 1e-12);
        }
    }
    // a kernel sample outside the raster makes the sum NaN
    assert!(out[0].raster.get_f64(0, 0, 0).is_nan());

    assert!(matches!(
        bm.compile("conv(kernel, im1b1N5x3)"),
        Err(BandMathError::Dimensionality { .. })
    ));
}

#[test]
fn division_scenario_tags_zero_divisors() {
    let a = raster(1, 100, 100, |_, y, x| x as f64 + y as f64 - 50.0);
    let b = raster(1, 100, 100, |_, y, x| (x * y) as f64);
    let mut bm = BandMathX::default();
    bm.register_input(&a, None).unwrap();
    bm.register_input(&b, None).unwrap();
    bm.compile("im1b1 / im2b1").unwrap();
    let out = bm.run().unwrap();

    let raster_out = &out[0].raster;
    for y in 0..100 {
        for x in 0..100 {
            let v = raster_out.get_f64(0, y, x);
            if x * y == 0 {
                assert!(v.is_nan(), "({}, {}) should be NaN", x, y);
            } else {
                let expected = (x as f64 + y as f64 - 50.0) / (x * y) as f64;
                assert_abs_diff_eq!(v, expected, epsilon = 1e-9);
            }
        }
    }
    assert_eq!(out[0].diagnostics.runtime_errors, 0);
}

#[test]
fn clamping_is_counted_per_expression() {
    let a = raster(1, 2, 3, |_, r, c| [-5.0, 0.0, 100.0, 300.0, f64::NAN, 255.5][r * 3 + c]);
    let mut bm = BandMathX::new(BandMathParams {
        output_type: PixelType::U8,
        ..sequential()
    });
    bm.register_input(&a, None).unwrap();
    bm.compile("im1b1").unwrap();
    bm.compile_typed("im1b1", PixelType::F64).unwrap();
    let out = bm.run().unwrap();

    let u8_out = &out[0];
    assert_eq!(u8_out.diagnostics.underflow, 1);
    assert_eq!(u8_out.diagnostics.overflow, 2);
    assert_eq!(u8_out.diagnostics.runtime_errors, 0);
    assert_eq!(u8_out.diagnostics.nan_to_integer, 1);
    assert_eq!(u8_out.raster.get_f64(0, 0, 0), 0.0);
    assert_eq!(u8_out.raster.get_f64(0, 1, 0), 255.0);
    assert_eq!(u8_out.raster.get_f64(0, 1, 1), 0.0);

    assert!(out[1].diagnostics.is_clean());
    assert!(out[1].raster.get_f64(0, 1, 1).is_nan());
}

#[test]
fn division_by_zero_into_integer_output_is_counted() {
    let a = raster(1, 2, 2, |_, r, c| (r * 2 + c) as f64 * 10.0);
    let b = raster(1, 2, 2, |_, r, _| r as f64);
    let mut bm = BandMathX::new(BandMathParams {
        output_type: PixelType::U8,
        ..sequential()
    });
    bm.register_input(&a, None).unwrap();
    bm.register_input(&b, None).unwrap();
    bm.compile("im1b1 / im2b1").unwrap();
    let out = bm.run().unwrap();

    let d = out[0].diagnostics;
    assert_eq!(d.nan_to_integer, 2);
    assert_eq!(d.clamped(), 0);
    assert!(!d.is_clean());
    assert_eq!(out[0].raster.get_f64(0, 0, 1), 0.0);
    assert_eq!(out[0].raster.get_f64(0, 1, 1), 30.0);
}

#[test]
fn cancelled_pass_returns_no_output() {
    let a = raster(1, 10, 10, |_, r, c| (r + c) as f64);
    let mut bm = BandMathX::default();
    bm.register_input(&a, None).unwrap();
    bm.compile("im1b1 + 1").unwrap();

    bm.cancel_token().cancel();
    assert!(matches!(bm.run(), Err(BandMathError::Cancelled)));

    // the token is cleared once the cancelled pass returns
    let out = bm.run().unwrap();
    assert_eq!(out[0].raster.get_f64(0, 9, 9), 19.0);
}

#[test]
fn catalog_changes_trigger_recompilation() {
    let a = raster(1, 3, 3, |_, r, c| (r * 3 + c) as f64);
    let b = raster(2, 3, 3, |band, _, _| band as f64 + 10.0);
    let mut bm = BandMathX::new(sequential());
    bm.register_input(&a, None).unwrap();
    let h = bm.compile("im1b1 * 2").unwrap();
    let before = bm.expression(h).unwrap().generation();

    bm.register_input(&b, Some("other")).unwrap();
    bm.declare_constant("offset", 0.5).unwrap();
    assert!(bm.expression(h).unwrap().is_stale(bm.catalog()));
    bm.compile("im1b1 + otherb2 + offset").unwrap();

    let out = bm.run().unwrap();
    assert!(bm.expression(h).unwrap().generation() > before);
    assert!(!bm.expression(h).unwrap().is_stale(bm.catalog()));
    assert_eq!(out[0].raster.get_f64(0, 2, 2), 16.0);
    assert_eq!(out[1].raster.get_f64(0, 2, 2), 8.0 + 11.0 + 0.5);

    let c = raster(1, 4, 3, |_, _, _| 0.0);
    assert!(matches!(
        bm.register_input(&c, None),
        Err(BandMathError::Core(_))
    ));
}

#[test]
fn sub_region_pass_reads_across_its_boundary() {
    let a = raster(1, 9, 8, |_, r, c| (r * 8 + c) as f64)
        .with_transform(GeoTransform::new(500.0, 900.0, 10.0, -10.0));
    let mut bm = BandMathX::default();
    bm.register_input(&a, None).unwrap();
    bm.compile("mean(im1b1N3x3) ; im1b1 - im1b1Mini ; im1PhyX").unwrap();
    let full = bm.run().unwrap();

    let region = Region::new(3, 2, 4, 5);
    let part = bm.run_region(region).unwrap();
    let out = &part[0].raster;
    assert_eq!(out.shape(), (4, 5));
    assert_eq!(out.transform(), GeoTransform::new(520.0, 870.0, 10.0, -10.0));

    for r in 0..4 {
        for c in 0..5 {
            for band in 0..3 {
                assert_eq!(
                    out.get_f64(band, r, c),
                    full[0].raster.get_f64(band, r + 3, c + 2)
                );
            }
        }
    }
    assert_eq!(out.get_f64(2, 0, 0), 525.0);
}

#[test]
fn errors_report_offending_text() {
    let a = raster(3, 4, 4, |_, _, _| 1.0);
    let b = raster(2, 4, 4, |_, _, _| 1.0);
    let mut bm = BandMathX::default();
    bm.register_input(&a, None).unwrap();
    bm.register_input(&b, None).unwrap();

    let err = bm.compile("im1 + im2").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("im1 + im2"), "{}", message);
    assert!(message.contains("1x3") && message.contains("1x2"), "{}", message);

    let err = bm.compile("nope * im3b1").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("nope") && message.contains("im3b1"), "{}", message);

    assert!(matches!(
        bm.compile("im1b4"),
        Err(BandMathError::BandOutOfRange { band: 4, count: 3, .. })
    ));
    assert!(matches!(
        bm.declare_constant("im1b1", 2.0),
        Err(BandMathError::NameCollision { .. })
    ));
    assert!(bm.expressions().is_empty());
}
