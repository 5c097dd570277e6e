//! Dataset engineering
//!
//! Turns a raw crop/weather CSV into labeled observations in feature-contract
//! form: column aliases are resolved, crop names normalized, bad numeric cells
//! mean-imputed, soil moisture synthesized when the source has none, and the
//! target either synthesized from the canonical formula or scaled from an
//! existing column.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use shared::{
    is_known_crop, normalize_crop_type, synthetic_soil_moisture, LabeledObservation, Observation,
    TargetFormula, CROP_TYPE, DEFAULT_SEED, FEATURE_COLUMNS, HUMIDITY_PERCENT, RAINFALL_MM,
    SOIL_MOISTURE_PERCENT, TARGET_COLUMN, TEMPERATURE_CELSIUS,
};

use crate::config::{TargetSource, TrainingConfig};
use crate::error::{AppError, AppResult};

/// Raw column names accepted in place of contract names
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("label", CROP_TYPE),
    ("temperature", TEMPERATURE_CELSIUS),
    ("humidity", HUMIDITY_PERCENT),
    ("rainfall", RAINFALL_MM),
];

/// Numeric columns every raw dataset must provide
const REQUIRED_NUMERIC: [&str; 3] = [TEMPERATURE_CELSIUS, HUMIDITY_PERCENT, RAINFALL_MM];

/// How raw rows become training rows
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub target_source: TargetSource,
    /// Multiplier applied to existing targets
    pub target_scale: f64,
    /// Seed for synthetic moisture and target noise
    pub seed: u64,
    pub formula: TargetFormula,
    pub max_unknown_crop_fraction: f64,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            target_source: TargetSource::Synthesize,
            target_scale: 5.5,
            seed: DEFAULT_SEED,
            formula: TargetFormula::CANONICAL,
            max_unknown_crop_fraction: 0.5,
        }
    }
}

impl DatasetOptions {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            target_source: config.target_source,
            target_scale: config.target_scale,
            seed: config.random_seed,
            formula: TargetFormula::CANONICAL.with_noise_std(config.noise_std),
            max_unknown_crop_fraction: config.max_unknown_crop_fraction,
        }
    }
}

/// What happened while engineering a dataset
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetSummary {
    pub raw_rows: usize,
    pub usable_rows: usize,
    pub duplicate_header_rows: usize,
    pub empty_crop_rows: usize,
    pub missing_target_rows: usize,
    /// Non-numeric cells replaced by their column mean
    pub imputed_cells: usize,
    pub synthesized_soil_moisture: bool,
    pub unknown_crop_rows: usize,
    pub crop_counts: BTreeMap<String, usize>,
}

/// Engineered rows ready for training
#[derive(Debug, Clone)]
pub struct EngineeredDataset {
    pub rows: Vec<LabeledObservation>,
    pub summary: DatasetSummary,
}

impl EngineeredDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.rows.iter().map(|r| r.observation.clone()).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| r.water_requirement_liters_per_hectare)
            .collect()
    }
}

/// Read and engineer a dataset file
pub fn load_dataset(path: impl AsRef<Path>, options: &DatasetOptions) -> AppResult<EngineeredDataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AppError::Dataset(format!(
            "Dataset '{}' not found",
            path.display()
        )));
    }
    tracing::info!("Loading dataset from {}", path.display());
    engineer_dataset(File::open(path)?, options)
}

/// One raw row with its cells resolved but not yet imputed
struct RawRow {
    crop_type: String,
    numeric: Vec<Option<f64>>,
    target: Option<f64>,
}

fn parse_cell(cell: Option<&str>) -> Option<f64> {
    cell.and_then(|c| c.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Engineer a dataset from any CSV source with a header row
pub fn engineer_dataset<R: Read>(reader: R, options: &DatasetOptions) -> AppResult<EngineeredDataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let raw_headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if raw_headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::Dataset("Dataset is empty".into()));
    }

    let mut columns: HashMap<String, usize> = HashMap::new();
    for (idx, header) in raw_headers.iter().enumerate() {
        let lowered = header.to_lowercase();
        let name = COLUMN_ALIASES
            .iter()
            .find(|(alias, _)| *alias == lowered)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(lowered);
        columns.entry(name).or_insert(idx);
    }

    let column = |name: &str| -> AppResult<usize> {
        columns
            .get(name)
            .copied()
            .ok_or_else(|| AppError::Dataset(format!("Dataset is missing required column '{name}'")))
    };
    let crop_idx = column(CROP_TYPE)?;
    let mut numeric_idx = REQUIRED_NUMERIC
        .iter()
        .map(|name| column(*name))
        .collect::<AppResult<Vec<usize>>>()?;
    let moisture_idx = columns.get(SOIL_MOISTURE_PERCENT).copied();
    if let Some(idx) = moisture_idx {
        numeric_idx.push(idx);
    }
    let target_idx = match options.target_source {
        TargetSource::Existing => Some(column(TARGET_COLUMN)?),
        TargetSource::Synthesize => None,
    };

    // A repeated header may come from a file using either naming
    let header_names: Vec<String> = raw_headers
        .iter()
        .map(|h| normalize_crop_type(h))
        .chain(columns.keys().map(|k| normalize_crop_type(k)))
        .chain(COLUMN_ALIASES.iter().map(|(alias, _)| alias.to_string()))
        .collect();
    let mut summary = DatasetSummary::default();
    let mut raw_rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        summary.raw_rows += 1;

        let crop_type = normalize_crop_type(record.get(crop_idx).unwrap_or(""));
        if crop_type.is_empty() {
            summary.empty_crop_rows += 1;
            continue;
        }
        if header_names.contains(&crop_type) {
            summary.duplicate_header_rows += 1;
            continue;
        }

        let target = target_idx.map(|idx| parse_cell(record.get(idx)));
        let target = match target {
            Some(None) => {
                summary.missing_target_rows += 1;
                continue;
            }
            Some(Some(value)) => Some(value),
            None => None,
        };

        raw_rows.push(RawRow {
            crop_type,
            numeric: numeric_idx.iter().map(|&idx| parse_cell(record.get(idx))).collect(),
            target,
        });
    }

    if raw_rows.is_empty() {
        return Err(AppError::Dataset(format!(
            "Dataset has no usable rows ({} read)",
            summary.raw_rows
        )));
    }

    // Column means over the parseable cells
    let mut means = Vec::with_capacity(numeric_idx.len());
    for j in 0..numeric_idx.len() {
        let values: Vec<f64> = raw_rows.iter().filter_map(|r| r.numeric[j]).collect();
        if values.is_empty() {
            return Err(AppError::Dataset(format!(
                "Column '{}' has no numeric values",
                raw_headers[numeric_idx[j]]
            )));
        }
        means.push(values.iter().sum::<f64>() / values.len() as f64);
    }

    summary.unknown_crop_rows = raw_rows.iter().filter(|r| !is_known_crop(&r.crop_type)).count();
    let unknown_fraction = summary.unknown_crop_rows as f64 / raw_rows.len() as f64;
    if unknown_fraction > options.max_unknown_crop_fraction {
        return Err(AppError::Dataset(format!(
            "{:.1}% of rows have crops missing from the base-water table (limit {:.1}%)",
            unknown_fraction * 100.0,
            options.max_unknown_crop_fraction * 100.0
        )));
    }
    if summary.unknown_crop_rows > 0 {
        tracing::warn!(
            "{} rows have crops missing from the base-water table; using the default base",
            summary.unknown_crop_rows
        );
    }

    let mut rng = StdRng::seed_from_u64(options.seed);

    // All synthetic moisture is drawn before any target noise
    let synthetic_moisture: Option<Vec<f64>> = moisture_idx
        .is_none()
        .then(|| raw_rows.iter().map(|_| synthetic_soil_moisture(&mut rng)).collect());
    summary.synthesized_soil_moisture = synthetic_moisture.is_some();

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (i, raw) in raw_rows.iter().enumerate() {
        let values: Vec<f64> = raw
            .numeric
            .iter()
            .zip(&means)
            .map(|(cell, mean)| {
                cell.unwrap_or_else(|| {
                    summary.imputed_cells += 1;
                    *mean
                })
            })
            .collect();

        let soil_moisture = match &synthetic_moisture {
            Some(drawn) => drawn[i],
            None => values[3],
        };
        let observation = Observation::new(&raw.crop_type, soil_moisture, values[0], values[1], values[2]);

        let target = match raw.target {
            Some(existing) => existing * options.target_scale,
            None => options.formula.synthesize_target(&observation, &mut rng),
        };

        *summary.crop_counts.entry(observation.crop_type.clone()).or_default() += 1;
        rows.push(LabeledObservation {
            observation,
            water_requirement_liters_per_hectare: target,
        });
    }
    summary.usable_rows = rows.len();

    tracing::info!(
        "Engineered {} of {} rows ({} crops, {} cells imputed, soil moisture {})",
        summary.usable_rows,
        summary.raw_rows,
        summary.crop_counts.len(),
        summary.imputed_cells,
        if summary.synthesized_soil_moisture { "synthesized" } else { "from source" }
    );

    Ok(EngineeredDataset { rows, summary })
}

/// Write engineered rows as CSV: contract columns then the target
pub fn write_engineered_csv(path: impl AsRef<Path>, rows: &[LabeledObservation]) -> AppResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut header: Vec<&str> = FEATURE_COLUMNS.to_vec();
    header.push(TARGET_COLUMN);
    writer.write_record(&header)?;

    for row in rows {
        let obs = &row.observation;
        writer.write_record([
            obs.crop_type.clone(),
            obs.soil_moisture_percent.to_string(),
            obs.temperature_celsius.to_string(),
            obs.humidity_percent.to_string(),
            obs.rainfall_mm.to_string(),
            obs.crop_water_base.to_string(),
            row.water_requirement_liters_per_hectare.to_string(),
        ])?;
    }
    writer.flush()?;

    tracing::info!("Wrote {} engineered rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "N,P,K,temperature,humidity,ph,rainfall,label\n\
        90,42,43,20.8,82.0,6.5,2.0,rice\n\
        85,58,41,21.7,80.3,7.0,3.1,Maize\n\
        60,55,44,23.0,82.3,7.8,abc,banana\n\
        N,P,K,temperature,humidity,ph,rainfall,label\n\
        74,35,40,26.4,80.1,6.9,1.5,\n";

    #[test]
    fn test_aliases_and_cleanup() {
        let dataset = engineer_dataset(RAW.as_bytes(), &DatasetOptions::default()).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.summary.duplicate_header_rows, 1);
        assert_eq!(dataset.summary.empty_crop_rows, 1);
        assert_eq!(dataset.summary.imputed_cells, 1);
        assert!(dataset.summary.synthesized_soil_moisture);

        let maize = &dataset.rows[1].observation;
        assert_eq!(maize.crop_type, "maize");
        assert_eq!(maize.crop_water_base, 5000.0);

        // Imputed with the mean of 2.0 and 3.1
        let banana = &dataset.rows[2].observation;
        assert!((banana.rainfall_mm - 2.55).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_header_under_other_naming_dropped() {
        let raw = "label,temperature,humidity,rainfall\n\
            rice,25,70,2\n\
            crop_type,temperature_celsius,humidity_percent,rainfall_mm\n\
            maize,30,60,1\n";
        let dataset = engineer_dataset(raw.as_bytes(), &DatasetOptions::default()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.summary.duplicate_header_rows, 1);
        assert_eq!(dataset.summary.unknown_crop_rows, 0);
        assert_eq!(dataset.summary.imputed_cells, 0);

        let engineered = "crop_type,temperature_celsius,humidity_percent,rainfall_mm\n\
            rice,25,70,2\n\
            label,temperature,humidity,rainfall\n";
        let dataset = engineer_dataset(engineered.as_bytes(), &DatasetOptions::default()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.summary.duplicate_header_rows, 1);
    }

    #[test]
    fn test_engineering_is_seeded() {
        let a = engineer_dataset(RAW.as_bytes(), &DatasetOptions::default()).unwrap();
        let b = engineer_dataset(RAW.as_bytes(), &DatasetOptions::default()).unwrap();
        assert_eq!(a.rows, b.rows);
        for row in &a.rows {
            assert!(row.water_requirement_liters_per_hectare >= shared::TARGET_FLOOR);
            assert_eq!(row.water_requirement_liters_per_hectare.fract(), 0.0);
        }
    }

    #[test]
    fn test_existing_target_is_scaled() {
        let raw = "label,temperature,humidity,rainfall,soil_moisture_percent,water_requirement_liters_per_hectare\n\
            rice,25,70,2,50,1000\n\
            rice,25,70,2,50,\n";
        let options = DatasetOptions {
            target_source: TargetSource::Existing,
            ..DatasetOptions::default()
        };
        let dataset = engineer_dataset(raw.as_bytes(), &options).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.summary.missing_target_rows, 1);
        assert!(!dataset.summary.synthesized_soil_moisture);
        assert_eq!(dataset.rows[0].observation.soil_moisture_percent, 50.0);
        assert_eq!(dataset.rows[0].water_requirement_liters_per_hectare, 5500.0);
    }

    #[test]
    fn test_missing_column_fails() {
        let raw = "label,temperature,humidity\nrice,25,70\n";
        let err = engineer_dataset(raw.as_bytes(), &DatasetOptions::default()).unwrap_err();
        assert!(err.to_string().contains("rainfall_mm"));
    }

    #[test]
    fn test_no_usable_rows_fails() {
        let raw = "label,temperature,humidity,rainfall\n";
        assert!(matches!(
            engineer_dataset(raw.as_bytes(), &DatasetOptions::default()),
            Err(AppError::Dataset(_))
        ));
    }

    #[test]
    fn test_unknown_crop_share_is_bounded() {
        let raw = "label,temperature,humidity,rainfall\n\
            coffee,25,70,2\n\
            kidneybeans,25,70,2\n\
            rice,25,70,2\n";
        assert!(engineer_dataset(raw.as_bytes(), &DatasetOptions::default()).is_err());

        let lenient = DatasetOptions {
            max_unknown_crop_fraction: 1.0,
            ..DatasetOptions::default()
        };
        let dataset = engineer_dataset(raw.as_bytes(), &lenient).unwrap();
        assert_eq!(dataset.summary.unknown_crop_rows, 2);
        assert_eq!(dataset.rows[0].observation.crop_water_base, 4000.0);
    }
}
