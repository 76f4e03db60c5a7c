use crate::{
    assignment::SelectionMode,
    categories::SchoolType,
    impedance::DecayFunction,
    ipu::UpdateMode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// ── Calibration ────────────────────────────────────────────────────

/// Numeric controls for the IPU solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpuParams {
    pub max_iterations: u32,
    /// Converged once every attribute's relative error drops below this.
    pub max_error: f64,
    /// Minimum relative improvement between two checkpoints.
    pub improvement_error_threshold: f64,
    pub iterations_per_improvement_check: u32,
    /// Stop as diverging when error exceeds best-seen error times this.
    pub error_increase_factor: f64,
    /// Error value the first checkpoint is compared against.
    pub initial_error_guess: f64,
    #[serde(default)]
    pub update_mode: UpdateMode,
}

impl Default for IpuParams {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            max_error: 0.0001,
            improvement_error_threshold: 0.001,
            iterations_per_improvement_check: 2,
            error_increase_factor: 1.05,
            initial_error_guess: 10_000.0,
            update_mode: UpdateMode::Sequential,
        }
    }
}

// ── Income ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeBracket {
    pub code: i32,
    pub low:  f64,
    /// `None` marks the open-ended top bracket.
    #[serde(default)]
    pub high: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeConfig {
    pub gamma_shape:    f64,
    pub gamma_rate:     f64,
    /// Bracket code that always yields an income of zero.
    pub no_income_code: i32,
    pub brackets:       Vec<IncomeBracket>,
}

// ── Assignment ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolTierConfig {
    pub school_type: SchoolType,
    pub decay:       DecayFunction,
    pub selection:   SelectionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    pub job_decay:          DecayFunction,
    pub job_selection:      SelectionMode,
    pub school_tiers:       Vec<SchoolTierConfig>,
    /// Width of one trip-length histogram bin, in distance-matrix units.
    pub trip_length_bin:    f64,
    pub trip_length_bins:   usize,
}

impl AssignmentConfig {
    pub fn school_tier(&self, school_type: SchoolType) -> Option<&SchoolTierConfig> {
        self.school_tiers.iter().find(|t| t.school_type == school_type)
    }
}

// ── Run options ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    pub seed: u64,
    /// Use weights already in the store under `weights_key` instead of fitting.
    #[serde(default)]
    pub reuse_weights: bool,
    pub weights_key: String,
}

#[derive(Debug, Clone)]
pub struct SynPopConfig {
    pub run:        RunOptions,
    pub ipu:        IpuParams,
    pub income:     IncomeConfig,
    pub assignment: AssignmentConfig,
}

fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}

impl SynPopConfig {
    /// Load from the data/ directory.
    /// In tests, use SynPopConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let run: RunOptions = read_json(&format!("{data_dir}/config/run.json"))?;
        let ipu: IpuParams = read_json(&format!("{data_dir}/config/ipu.json"))?;
        let income: IncomeConfig = read_json(&format!("{data_dir}/config/income.json"))?;
        let assignment: AssignmentConfig =
            read_json(&format!("{data_dir}/config/assignment.json"))?;

        if income.brackets.is_empty() {
            anyhow::bail!("{data_dir}/config/income.json: no income brackets");
        }
        if assignment.trip_length_bin <= 0.0 || assignment.trip_length_bins == 0 {
            anyhow::bail!("{data_dir}/config/assignment.json: empty trip-length histogram");
        }

        Ok(Self { run, ipu, income, assignment })
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let income = IncomeConfig {
            gamma_shape: 1.9,
            gamma_rate: 0.0008,
            no_income_code: 90,
            brackets: vec![
                IncomeBracket { code: 90, low: 0.0, high: Some(0.0) },
                IncomeBracket { code: 1, low: 0.0, high: Some(500.0) },
                IncomeBracket { code: 2, low: 500.0, high: Some(900.0) },
                IncomeBracket { code: 3, low: 900.0, high: Some(1_300.0) },
                IncomeBracket { code: 4, low: 1_300.0, high: Some(2_000.0) },
                IncomeBracket { code: 5, low: 2_000.0, high: Some(3_200.0) },
                IncomeBracket { code: 6, low: 3_200.0, high: Some(4_500.0) },
                IncomeBracket { code: 7, low: 4_500.0, high: None },
            ],
        };

        let assignment = AssignmentConfig {
            job_decay: DecayFunction::DoubleExponential { alpha: 20.0, gamma: -0.05 },
            job_selection: SelectionMode::VacancyWeighted,
            school_tiers: vec![
                SchoolTierConfig {
                    school_type: SchoolType::Primary,
                    decay: DecayFunction::DoubleExponential { alpha: 25.0, gamma: -0.3 },
                    selection: SelectionMode::VacancyWeighted,
                },
                SchoolTierConfig {
                    school_type: SchoolType::Secondary,
                    decay: DecayFunction::DoubleExponential { alpha: 20.0, gamma: -0.15 },
                    selection: SelectionMode::VacancyWeighted,
                },
                SchoolTierConfig {
                    school_type: SchoolType::Tertiary,
                    decay: DecayFunction::Exponential { beta: -0.02 },
                    selection: SelectionMode::CapacityWeighted,
                },
            ],
            trip_length_bin: 1.0,
            trip_length_bins: 100,
        };

        Self {
            run: RunOptions {
                seed: 42,
                reuse_weights: false,
                weights_key: "test".into(),
            },
            ipu: IpuParams {
                max_iterations: 200,
                ..IpuParams::default()
            },
            income,
            assignment,
        }
    }
}
