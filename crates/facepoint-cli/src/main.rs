use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facepoint_engine::{EngineConfig, FaceEngine, IdentityId};
use image::RgbImage;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facepoint", about = "Facepoint attendance face engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll an identity from one or more face images
    Enroll {
        /// Identity to enroll (the attendance user id)
        #[arg(short, long)]
        id: String,
        /// Image files containing the face to enroll
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Recognize the largest face in an image
    Recognize {
        /// Probe image file
        image: PathBuf,
    },
    /// Remove all enrolled face data for an identity
    Remove {
        /// Identity to remove
        #[arg(short, long)]
        id: String,
    },
    /// Replace an identity's face data wholesale
    ReEnroll {
        #[arg(short, long)]
        id: String,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Show gallery and classifier status
    Status,
}

fn load_image(path: &PathBuf) -> Result<RgbImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode {}", path.display()))?
        .to_rgb8();
    Ok(image)
}

fn load_images(paths: &[PathBuf]) -> Result<Vec<RgbImage>> {
    paths.iter().map(load_image).collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut engine = FaceEngine::open(EngineConfig::from_env())?;

    match cli.command {
        Commands::Enroll { id, images } => {
            let frames = load_images(&images)?;
            let report = engine.enroll(&IdentityId::new(id.clone()), &frames)?;
            println!(
                "enrolled {id}: {} of {} samples accepted, {} rows stored",
                report.accepted_samples,
                frames.len(),
                report.stored_rows
            );
            for (index, reason) in &report.rejected {
                println!("  sample {index} rejected: {reason}");
            }
        }
        Commands::Recognize { image } => {
            let frame = load_image(&image)?;
            let recognition = engine.recognize_best(&frame);
            match recognition.identity {
                Some(identity) => println!(
                    "match: {identity} (confidence {:.3})",
                    recognition.confidence
                ),
                None => println!(
                    "no match (confidence {:.3})",
                    recognition.confidence
                ),
            }
        }
        Commands::Remove { id } => {
            let removed = engine.remove(&IdentityId::new(id.clone()))?;
            if removed == 0 {
                println!("{id}: not enrolled, nothing removed");
            } else {
                println!("{id}: removed {removed} stored embeddings");
            }
        }
        Commands::ReEnroll { id, images } => {
            let frames = load_images(&images)?;
            let report = engine.re_enroll(&IdentityId::new(id.clone()), &frames)?;
            println!(
                "re-enrolled {id}: {} samples accepted, {} rows stored",
                report.accepted_samples, report.stored_rows
            );
        }
        Commands::Status => {
            let status = engine.status();
            println!("state:      {}", status.state);
            println!("identities: {}", status.enrolled_identities);
            println!("embeddings: {}", status.stored_embeddings);
        }
    }

    Ok(())
}
