//! Candidate price grid construction
//!
//! Grids are bounded (default 50 points) because the optimizer runs one
//! model prediction per point. When a base price is known the grid gets a
//! half-step dense region at base ±20%, which is where the optimum almost
//! always lives; capping keeps the neighbors of the base over uniform
//! coverage.

/// Whether floor/ceiling can produce a usable grid.
pub fn constraints_valid(floor: f64, ceiling: f64) -> bool {
    floor > 0.0 && ceiling > 0.0 && ceiling > floor
}

/// Build the candidate grid for `[floor, ceiling]`.
///
/// With a base inside the bounds, the region `[max(floor, 0.8*base),
/// min(ceiling, 1.2*base)]` uses half the coarse step; outside it the
/// coarse step applies. Prices are rounded to cents, deduplicated and
/// sorted ascending.
pub fn build_price_grid(floor: f64, ceiling: f64, base: Option<f64>, step: f64) -> Vec<f64> {
    let mut grid: Vec<f64> = Vec::new();

    match base.filter(|b| (floor..=ceiling).contains(b)) {
        Some(base) => {
            let dense_min = floor.max(base * 0.8);
            let dense_max = ceiling.min(base * 1.2);
            let dense_step = step * 0.5;

            let mut current = floor;
            while current < dense_min {
                grid.push(round_cents(current));
                current += step;
            }

            let mut current = dense_min;
            while current <= dense_max + 1e-6 {
                grid.push(round_cents(current));
                current += dense_step;
            }

            let mut current = dense_max + step;
            while current <= ceiling + 1e-6 {
                grid.push(round_cents(current));
                current += step;
            }
        }
        None => {
            let mut current = floor;
            while current <= ceiling + 1e-6 {
                grid.push(round_cents(current));
                current += step;
            }
        }
    }

    // Cent rounding can nudge an edge point past a non-cent bound
    let grid = grid.into_iter().map(|p| p.clamp(floor, ceiling)).collect();
    dedup_sorted(grid)
}

/// Cap a grid at `max_points`.
///
/// With a base, keep the ±10 neighbors of the base plus the first five and
/// last five points of the full grid; otherwise sample uniformly by
/// stride. Either way the result stays sorted, deduplicated and within
/// the original bounds.
pub fn cap_grid(grid: Vec<f64>, base: Option<f64>, max_points: usize) -> Vec<f64> {
    if grid.len() <= max_points {
        return grid;
    }

    match base {
        Some(base) => {
            let base_idx = grid
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    (*a - base)
                        .abs()
                        .partial_cmp(&(*b - base).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
                .unwrap_or(0);

            let start = base_idx.saturating_sub(10);
            let end = (base_idx + 10).min(grid.len());

            let mut sampled: Vec<f64> = Vec::new();
            sampled.extend(grid.iter().take(5));
            sampled.extend(grid[start..end].iter());
            sampled.extend(grid.iter().rev().take(5).rev());

            let mut sampled = dedup_sorted(sampled);
            sampled.truncate(max_points);
            sampled
        }
        None => {
            let stride = (grid.len() / max_points).max(1);
            grid.into_iter()
                .step_by(stride)
                .take(max_points)
                .collect()
        }
    }
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

fn dedup_sorted(mut grid: Vec<f64>) -> Vec<f64> {
    grid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    grid.dedup();
    grid
}
