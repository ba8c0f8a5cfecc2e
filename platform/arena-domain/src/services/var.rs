use crate::services::returns::{mean, sample_std};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarMethod {
    Historical,
    Parametric,
}

impl VarMethod {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "historical" | "hist" => Ok(Self::Historical),
            "parametric" | "normal" | "gaussian" => Ok(Self::Parametric),
            other => Err(format!(
                "unsupported var method: {other} (expected historical | parametric)"
            )),
        }
    }
}

/// Losses are reported as positive numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VarEstimate {
    pub method: VarMethod,
    pub confidence: f64,
    pub var: f64,
    pub cvar: f64,
    pub observations: usize,
}

/// Linear interpolation between closest ranks. `sorted` must be ascending.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn check_inputs(returns: &[f64], confidence: f64) -> Result<(), String> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(format!("confidence must be in (0, 1), got {confidence}"));
    }
    if returns.is_empty() {
        return Err("cannot estimate VaR of an empty series".to_string());
    }
    if returns.iter().any(|r| !r.is_finite()) {
        return Err("returns must be finite".to_string());
    }
    Ok(())
}

pub fn historical_var(returns: &[f64], confidence: f64) -> Result<VarEstimate, String> {
    check_inputs(returns, confidence)?;
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let cutoff = quantile_sorted(&sorted, 1.0 - confidence);
    let tail: Vec<f64> = sorted.iter().copied().take_while(|r| *r <= cutoff).collect();
    Ok(VarEstimate {
        method: VarMethod::Historical,
        confidence,
        var: -cutoff,
        cvar: -mean(&tail),
        observations: returns.len(),
    })
}

pub fn parametric_var(returns: &[f64], confidence: f64) -> Result<VarEstimate, String> {
    check_inputs(returns, confidence)?;
    let mu = mean(returns);
    let sigma = sample_std(returns);
    let alpha = 1.0 - confidence;
    let z = normal_quantile(alpha);
    Ok(VarEstimate {
        method: VarMethod::Parametric,
        confidence,
        var: -(mu + z * sigma),
        cvar: -(mu - sigma * normal_pdf(z) / alpha),
        observations: returns.len(),
    })
}

pub fn estimate(returns: &[f64], confidence: f64, method: VarMethod) -> Result<VarEstimate, String> {
    match method {
        VarMethod::Historical => historical_var(returns, confidence),
        VarMethod::Parametric => parametric_var(returns, confidence),
    }
}

pub fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Inverse standard normal CDF (Acklam's rational approximation).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}
