//! Data validation utilities.

use std::path::Path;

use rts_sim::config::SimConfig;
use rts_sim::error::{GameError, Result};
use rts_sim::scenario::MIN_SKIRMISH_SIZE;
use rts_sim::tech::{TechKind, TechTree, CONSTRUCTION_YARD};

/// Cross-reference problems in a tech tree that parsing alone accepts.
#[must_use]
pub fn tech_problems(tech: &TechTree) -> Vec<String> {
    let mut problems = Vec::new();
    if tech.get(CONSTRUCTION_YARD).is_none() {
        problems.push(format!("missing '{CONSTRUCTION_YARD}'"));
    }
    for def in tech.iter() {
        for prerequisite in &def.prerequisites {
            match tech.get(prerequisite) {
                None => problems.push(format!(
                    "'{}' requires unknown '{prerequisite}'",
                    def.key
                )),
                Some(p) if p.kind != TechKind::Building => problems.push(format!(
                    "'{}' requires '{prerequisite}', which is not a building",
                    def.key
                )),
                Some(_) => {}
            }
        }
        if def.cost < 0 {
            problems.push(format!("'{}' has a negative cost", def.key));
        }
        if def.hit_points <= 0 {
            problems.push(format!("'{}' has no hit points", def.key));
        }
    }
    problems
}

/// Load and check a config file and an optional tech file.
///
/// # Errors
///
/// Returns the first load error, or `DataParseError` listing every
/// cross-reference problem.
pub fn validate_files(config: Option<&Path>, tech: Option<&Path>) -> Result<()> {
    if let Some(path) = config {
        let config = SimConfig::load(path)?;
        if config.map_width < MIN_SKIRMISH_SIZE || config.map_height < MIN_SKIRMISH_SIZE {
            return Err(GameError::DataParseError {
                path: path.display().to_string(),
                message: format!(
                    "map {}x{} is below the {MIN_SKIRMISH_SIZE}x{MIN_SKIRMISH_SIZE} skirmish minimum",
                    config.map_width, config.map_height
                ),
            });
        }
    }

    if let Some(path) = tech {
        let tree = TechTree::load(path)?;
        let problems = tech_problems(&tree);
        if !problems.is_empty() {
            return Err(GameError::DataParseError {
                path: path.display().to_string(),
                message: problems.join("; "),
            });
        }
    }
    Ok(())
}
