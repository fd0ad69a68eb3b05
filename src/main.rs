use anyhow::Result;
use clap::Parser;
use log::{debug, error, info, trace};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use surface_agents::Simulation;
use surface_common::{SimulationConfig, Snapshot};

#[derive(Parser, Debug)]
#[command(author, version, about = "Surface agent flocking simulation")]
struct Args {
    /// Path to the simulation configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides timing.total_steps from the configuration.
    #[arg(short, long)]
    steps: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Starting surface agent simulation...");
    let config = SimulationConfig::load(&args.config)?;
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    let mut sim = Simulation::from_config(&config)?;
    let params = config.get_sim_params();
    debug!("Simulation Parameters: {:#?}", params);
    if !sim.diagnostics().is_clean() {
        info!("Field diagnostics: {:?}", sim.diagnostics());
    }

    let total_steps = args.steps.unwrap_or(config.timing.total_steps);
    let record_interval_steps = config.timing.record_interval_steps.max(1);
    info!(
        "Running {} steps, recording a snapshot every {} steps.",
        total_steps, record_interval_steps
    );

    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    sim.record_snapshot(&params.step)?;

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        if let Err(e) = sim.step(&params.step) {
            error!("Error during simulation step {}: {}", step + 1, e);
            anyhow::bail!("Simulation step failed.");
        }
        let step_duration = step_start_time.elapsed();

        let now = Instant::now();
        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step + 1 == total_steps;
        if is_record_step || is_last_step {
            sim.record_snapshot(&params.step)?;
        }

        if now.duration_since(previous_print_time).as_secs_f64() >= 5.0 || is_last_step {
            info!(
                "Step [{}/{}] | Agents: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                step + 1,
                total_steps,
                sim.agent_count(),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = now;
        } else {
            trace!("Step [{}/{}] completed in {:.2} ms", step + 1, total_steps, step_duration.as_secs_f64() * 1000.0);
        }
    }

    info!("Simulation finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());

    let output = &config.output;
    if output.save_stats {
        let format = output.format.as_deref().unwrap_or("json");
        if let Err(e) = save_snapshots(sim.get_recorded_snapshots(), &output.base_filename, format) {
            error!("Error saving snapshots: {}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output.save_positions {
        let filename = format!("{}_final_positions.csv", output.base_filename);
        let mut writer = csv::Writer::from_path(&filename)?;
        writer.write_record(["u", "v", "x", "y", "z"])?;
        for agent in sim.population() {
            let (uv, p) = (agent.uv(), agent.position());
            writer.write_record(
                [uv.x, uv.y, p.x, p.y, p.z].iter().map(|c| format!("{:.6}", c)),
            )?;
        }
        writer.flush()?;
        info!("Final positions saved to {}", filename);
    }

    info!("Simulation Complete.");
    Ok(())
}

/// Writes the recorded snapshots as json, bincode or messagepack.
fn save_snapshots(snapshots: &[Snapshot], base_filename: &str, format: &str) -> Result<()> {
    let format = match format {
        "json" | "bincode" | "messagepack" => format,
        other => {
            error!("Unknown output format: {}. Using JSON instead.", other);
            "json"
        }
    };
    let extension = match format {
        "bincode" => "bin",
        "messagepack" => "msgpack",
        _ => "json",
    };
    let filename = format!("{}_snapshots.{}", base_filename, extension);
    let mut writer = BufWriter::new(File::create(&filename)?);

    match format {
        "bincode" => bincode::serialize_into(&mut writer, snapshots)?,
        "messagepack" => rmp_serde::encode::write(&mut writer, snapshots)?,
        _ => serde_json::to_writer(&mut writer, snapshots)?,
    }
    writer.flush()?;
    info!("{} snapshots saved to {} ({} format)", snapshots.len(), filename, format);
    Ok(())
}
