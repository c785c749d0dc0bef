/*!
# Saving draws to CSV

Enable via the `csv` feature (on by default).
*/

use csv::Writer;
use std::fs::File;
use std::path::Path;

use crate::core::RunResult;
use crate::error::Result;

/**
Saves the draws of every chain of `run` as a CSV file.

The resulting CSV file will have:
- A header row with `chain`, `iteration`, `warmup`, `lp__` and one column
  per scalar component of every parameter and generated quantity, named like
  `theta[3]`.
- One row per draw, chains one after the other. `iteration` counts from 0
  at the first warm-up draw, so it is the same whether or not warm-up is
  written.

# Examples

```rust
use posterior_pipeline::core::{run, RunConfig};
use posterior_pipeline::io::csv::save_csv;
use posterior_pipeline::models::batting;

let spec = batting::spec().unwrap();
let config = RunConfig { num_chains: 2, num_iterations: 20, num_warmup: 10, ..Default::default() };
let result = run(&spec, &batting::efron_morris(), &config).unwrap();

let file = std::env::temp_dir().join("efron_morris_draws.csv");
save_csv(&result, &file, false).unwrap();
# std::fs::remove_file(file).ok();
```
*/
pub fn save_csv(run: &RunResult, path: impl AsRef<Path>, include_warmup: bool) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(path)?);
    let (names, matrices) = run.component_draws(!include_warmup);

    let mut header: Vec<String> = ["chain", "iteration", "warmup", "lp__"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(names);
    wtr.write_record(&header)?;

    let start = if include_warmup { 0 } else { run.num_warmup() };
    for (chain, values) in run.chains().iter().zip(&matrices) {
        let lp = &chain.log_densities()[start..];
        for (offset, (row, lp)) in values.outer_iter().zip(lp).enumerate() {
            let iteration = start + offset;
            let mut record = vec![
                chain.index().to_string(),
                iteration.to_string(),
                u8::from(iteration < chain.num_warmup()).to_string(),
                lp.to_string(),
            ];
            record.extend(row.iter().map(|v| v.to_string()));
            wtr.write_record(&record)?;
        }
    }

    wtr.flush()?;
    Ok(())
}
