/*!
# Saving Traces to CSV

This module provides a function to save a chain's trace to a CSV file for
inspection in R, Python, or a spreadsheet. Enable via the `csv` feature.
*/

use std::error::Error;
use std::fs::File;

use csv::Writer;
use ndarray::Axis;

use crate::trace::Trace;

/**
Saves a trace as a CSV file.

The resulting CSV file will have:
- A header row containing `"iteration"` followed by the trace's column names
  (the estimated parameters, then `"log_density"`).
- One subsequent row per recorded iteration.

# Arguments

* `trace` - The trace to write.
* `filename` - The file path where the CSV data will be written.

# Returns

Returns `Ok(())` if successful, or an error if any I/O or CSV formatting
issue occurs.

# Examples

```rust
use mhfit::io::csv::save_csv;
use mhfit::params::ParamVector;
use mhfit::sampler::{MetropolisHastings, Settings};

let target = |theta: &ParamVector| {
    let mu = theta.get("mu").unwrap();
    -0.5 * mu * mu
};
let init = ParamVector::from_pairs([("mu", 0.0)])?;
let settings = Settings {
    iterations: 100,
    proposal_sd: vec![("mu".into(), 1.0)],
    ..Settings::default()
};
let output = MetropolisHastings::new(target, init, settings)?
    .set_seed(42)
    .run()?;

save_csv(&output.trace, "/tmp/trace.csv").expect("Expecting saving the trace to succeed");
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/
pub fn save_csv(trace: &Trace, filename: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let mut header: Vec<String> = vec!["iteration".to_string()];
    header.extend(trace.names().iter().cloned());
    wtr.write_record(&header)?;

    for (row_idx, row) in trace.data().axis_iter(Axis(0)).enumerate() {
        let mut record = vec![row_idx.to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::Reader;
    use ndarray::{arr2, Array2};
    use std::fs;
    use tempfile::NamedTempFile;

    fn toy_trace() -> Trace {
        Trace::from_parts(
            vec!["a".to_string(), "log_density".to_string()],
            arr2(&[[1.5, -0.5], [2.5, -1.25], [2.5, -1.25]]),
        )
    }

    /// Test saving an empty trace (zero rows) to CSV.
    #[test]
    fn test_save_csv_empty_trace() {
        let trace = Trace::from_parts(
            vec!["a".to_string(), "log_density".to_string()],
            Array2::zeros((0, 2)),
        );
        let file = NamedTempFile::new().expect("Could not create temp file");
        let filename = file.path().to_str().unwrap();

        let result = save_csv(&trace, filename);
        assert!(
            result.is_ok(),
            "Saving empty trace to CSV failed: {:?}",
            result
        );

        // The function writes the header even if there are no rows.
        let contents = fs::read_to_string(filename).unwrap();
        assert_eq!(contents.trim(), "iteration,a,log_density");
    }

    /// Test saving a small trace and check the exact file contents.
    #[test]
    fn test_save_csv_contents() {
        let file = NamedTempFile::new().expect("Could not create temp file");
        let filename = file.path().to_str().unwrap();

        let result = save_csv(&toy_trace(), filename);
        assert!(result.is_ok());

        let contents = fs::read_to_string(filename).unwrap();
        let expected = "\
iteration,a,log_density
0,1.5,-0.5
1,2.5,-1.25
2,2.5,-1.25";
        assert_eq!(contents.trim(), expected);
    }

    #[test]
    fn test_save_csv_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let trace = Trace::from_parts(
            vec![
                "r0".to_string(),
                "v".to_string(),
                "log_density".to_string(),
            ],
            arr2(&[[0.5, 10.0, -3.0], [0.625, 11.0, -2.5]]),
        );
        let file = NamedTempFile::new()?;
        let filename = file.path().to_str().unwrap();
        save_csv(&trace, filename)?;
        let contents = fs::read_to_string(filename)?;

        // Use csv::Reader to parse the CSV file back.
        let mut rdr = Reader::from_reader(contents.as_bytes());
        let headers = rdr.headers()?;
        assert_eq!(&headers[0], "iteration");
        assert_eq!(&headers[1], "r0");
        assert_eq!(&headers[2], "v");
        assert_eq!(&headers[3], "log_density");

        let records: Vec<_> = rdr.records().collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 2);
        for (row_idx, record) in records.iter().enumerate() {
            assert_eq!(&record[0], row_idx.to_string().as_str());
            for (field, expected) in record.iter().skip(1).zip(trace.data().row(row_idx)) {
                assert_eq!(field.parse::<f64>()?, *expected);
            }
        }
        Ok(())
    }
}
