use od_modal_split::ModalSplitAssignment;
use env_logger;
use std::error::Error;


fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => return Err("usage: od_modal_split <config.yaml>".into()),
    };

    let mut assignment = ModalSplitAssignment::from_cfg(&config_path)?;
    let results = match assignment.run()? {
        Some(results) => results,
        None => {
            log::warn!("assignment cancelled");
            return Ok(());
        }
    };

    for (group, err) in &results.config_errors {
        log::error!("group {}: {}", group, err);
    }
    for (group, report) in &results.reports {
        if let Some(warning) = &report.calibration_warning {
            log::warn!("group {}: {}", group, warning);
        }
    }
    results.write_csv(std::io::stdout())?;
    log::info!("{} OD cells, {} of {} units of demand assigned", results.od_paths.len(),
               results.total_assigned_quantity(), results.stats.total_quantity);
    Ok(())
}
