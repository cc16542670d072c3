use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, value_parser};
use glam::Vec3;
use itertools::Itertools;

use crate::terrain::falloff::Falloff;
use crate::terrain::world::DEFAULT_VIEW_DISTANCE;

#[derive(Parser, Debug)]
#[command(name = "archterrain")]
#[command(version)]
#[command(about = "Terrain paging and streaming for an open world MMORPG client")]
pub struct CliArgs {
    /// The client installation, containing the `world` directory.
    #[arg(long, env = "ARCHTERRAIN_CLIENT_DIR", default_value_t = default_client_dir())]
    pub client_dir: String,

    #[arg(long, env = "ARCHTERRAIN_VIEW_DISTANCE", default_value_t = DEFAULT_VIEW_DISTANCE)]
    pub view_distance: f32,

    #[arg(long, env = "ARCHTERRAIN_WORKER_THREADS", default_value_t = 4)]
    pub worker_threads: usize,

    #[command(subcommand)]
    pub operation_mode: OperationMode,
}

pub fn default_client_dir() -> String {
    std::env::current_dir()
        .map(|dir| dir.to_string_lossy().to_string())
        .unwrap_or_else(|_| ".".to_string())
}

#[derive(Subcommand, Debug)]
pub enum OperationMode {
    /// Streams in the terrain around a position until the pager is idle.
    Stream {
        #[arg(long, value_parser = value_parser!(Vector3))]
        position: Vector3,
        /// Raises the terrain around the position by this much once loaded.
        #[arg(long, allow_hyphen_values = true)]
        raise: Option<f32>,
        #[arg(long, default_value_t = 1600.0)]
        radius: f32,
        #[arg(long, value_parser = value_parser!(Falloff), default_value = "linear")]
        falloff: Falloff,
        /// Writes every sector back to disk afterwards.
        #[arg(long)]
        commit: bool,
    },
    /// Lists the entries of a division's packs.
    Inspect {
        #[arg(long, value_parser = value_parser!(Division))]
        division: Division,
        /// Decodes the geometry pack instead of the segment pack.
        #[arg(long)]
        geometry: bool,
    },
}

/// Everything the terrain engine needs to know about its environment.
#[derive(Debug, Clone)]
pub struct TerrainSettings {
    pub client_dir: PathBuf,
    pub view_distance: f32,
    pub worker_threads: usize,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        TerrainSettings {
            client_dir: PathBuf::from(default_client_dir()),
            view_distance: DEFAULT_VIEW_DISTANCE,
            worker_threads: 4,
        }
    }
}

impl From<&CliArgs> for TerrainSettings {
    fn from(args: &CliArgs) -> Self {
        TerrainSettings {
            client_dir: PathBuf::from(&args.client_dir),
            view_distance: args.view_distance,
            worker_threads: args.worker_threads,
        }
    }
}

fn trim_brackets(input: &str) -> &str {
    input
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(input)
}

fn parse_components<T: FromStr>(s: &str, count: usize) -> Result<Vec<T>, String> {
    let string: String = s.chars().filter(|&c| !c.is_whitespace()).collect();
    let splits = trim_brackets(string.as_str()).split(',').collect_vec();
    if splits.len() != count {
        return Err(format!(
            "Comma splitting resulted in {} splits, not {}!",
            splits.len(),
            count
        ));
    }

    splits
        .iter()
        .map(|&split| {
            split
                .parse::<T>()
                .map_err(|_| format!("Failed to parse component {}", split))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<&Vector3> for Vec3 {
    fn from(value: &Vector3) -> Self {
        Vec3::new(value.x, value.y, value.z)
    }
}

impl FromStr for Vector3 {
    type Err = String;

    // (-a, b, c) or -a,b,c
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components = parse_components::<f32>(s, 3)?;
        Ok(Vector3 {
            x: components[0],
            y: components[1],
            z: components[2],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Division {
    pub x: u32,
    pub z: u32,
}

impl FromStr for Division {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components = parse_components::<u32>(s, 2)?;
        Ok(Division {
            x: components[0],
            z: components[1],
        })
    }
}
