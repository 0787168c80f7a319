//! Static posterior plot
use std::fmt::Display;
use std::path::Path;

use itertools::{izip, Itertools, MinMaxResult};
use log::info;
use nalgebra::DMatrix;
use plotters::prelude::*;

use crate::data::Dataset;
use crate::process::gaussian::Posterior;
use crate::result::{Error, ErrorKind, Result};

const SIZE: (u32, u32) = (800, 600);
const BAND: RGBColor = RGBColor(173, 198, 230);

fn plot_error<E: Display>(err: E) -> Error {
    Error::new(ErrorKind::Io, &format!("failed to draw plot: {err}"))
}

fn padded(range: MinMaxResult<f64>, pad: f64) -> (f64, f64) {
    let (lo, hi) = match range {
        MinMaxResult::NoElements => (0.0, 1.0),
        MinMaxResult::OneElement(x) => (x - 1.0, x + 1.0),
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
    };
    let width = (hi - lo).max(f64::EPSILON);
    (lo - pad * width, hi + pad * width)
}

/// Draw the observed points, the posterior mean and the shaded two standard
/// deviation region to an SVG file.
///
/// `x_test` must be a single column, sorted ascending, with one row per
/// entry of `posterior`.
pub fn render_posterior<P: AsRef<Path>>(
    path: P,
    data: &Dataset,
    x_test: &DMatrix<f64>,
    posterior: &Posterior,
) -> Result<()> {
    let n = posterior.mean().len();
    if x_test.ncols() != 1 || x_test.nrows() != n || data.x.ncols() != 1 {
        return Err(Error::new(
            ErrorKind::ShapeMismatch,
            &format!(
                "can only plot one-dimensional inputs; x_test is {:?} for {} predictions",
                x_test.shape(),
                n
            ),
        ));
    }

    let xs: Vec<f64> = x_test.column(0).iter().copied().collect();
    let (lower, upper) = posterior.confidence_region();

    let (x_lo, x_hi) = padded(
        xs.iter().chain(data.x.column(0).iter()).copied().minmax(),
        0.02,
    );
    let (y_lo, y_hi) = padded(
        lower
            .iter()
            .chain(upper.iter())
            .chain(data.y.iter())
            .copied()
            .filter(|y| y.is_finite())
            .minmax(),
        0.05,
    );

    let root = SVGBackend::new(path.as_ref(), SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("GP posterior", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(plot_error)?;
    chart.configure_mesh().draw().map_err(plot_error)?;

    let band: Vec<(f64, f64)> = xs
        .iter()
        .copied()
        .zip(upper.iter().copied())
        .chain(xs.iter().copied().zip(lower.iter().copied()).rev())
        .collect();
    chart
        .draw_series(std::iter::once(Polygon::new(band, BAND.mix(0.6).filled())))
        .map_err(plot_error)?
        .label("Confidence")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], BAND.filled()));

    chart
        .draw_series(LineSeries::new(
            izip!(xs.iter().copied(), posterior.mean().iter().copied()),
            BLUE.stroke_width(2),
        ))
        .map_err(plot_error)?
        .label("Mean")
        .legend(|(x, y)| PathElement::new([(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(
            izip!(data.x.column(0).iter(), data.y.iter())
                .map(|(&x, &y)| Circle::new((x, y), 3, BLACK.filled())),
        )
        .map_err(plot_error)?
        .label("Observed Data")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, BLACK.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    info!("wrote posterior plot to {}", path.as_ref().display());
    Ok(())
}
