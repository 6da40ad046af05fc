/// A win/loss probability pair as produced by the classifier.
#[derive(Debug, Clone, Copy)]
pub struct Prob2 {
    pub win: f64,
    pub loss: f64,
}

impl Prob2 {
    pub fn uniform() -> Self {
        Self {
            win: 0.5,
            loss: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

pub fn evaluate_probs(predictions: &[Prob2], outcomes: &[bool]) -> Metrics {
    if predictions.is_empty() || outcomes.is_empty() || predictions.len() != outcomes.len() {
        return Metrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        };
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, won) in predictions.iter().zip(outcomes) {
        let (y_win, y_loss) = if *won { (1.0, 0.0) } else { (0.0, 1.0) };
        brier_sum += (p.win - y_win).powi(2) + (p.loss - y_loss).powi(2);

        let actual_prob = if *won { p.win } else { p.loss }.clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();

        if (p.win >= p.loss) == *won {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

/// Bucket predictions by win probability and compare the average prediction
/// in each bucket against the observed win rate.
pub fn calibration_bins(
    predictions: &[Prob2],
    outcomes: &[bool],
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, won) in predictions.iter().zip(outcomes) {
        let win_prob = p.win.clamp(0.0, 1.0);
        let idx = ((win_prob * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += win_prob;
        if *won {
            actual_sum[idx] += 1.0;
        }
    }

    let mut out = Vec::with_capacity(bins);
    for i in 0..bins {
        let start = i as f64 / bins as f64;
        let end = (i + 1) as f64 / bins as f64;
        let count = counts[i];
        let (avg_pred, actual_rate) = if count > 0 {
            (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
        } else {
            (0.0, 0.0)
        };
        out.push(CalibrationBin {
            bucket_start: start,
            bucket_end: end,
            count,
            avg_pred,
            actual_rate,
        });
    }
    out
}
