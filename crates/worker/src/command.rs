//! Command line of the worker binary. Images are `data:` URIs.

use clap::{Parser, Subcommand, ValueEnum};

use mjrelay_midjourney::api::{BlendDimensions, ChangeAction};
use mjrelay_midjourney::{JobRequest, SubmitRequest};

/// Submit one Midjourney job and follow it until it finishes.
#[derive(Parser, Debug)]
#[command(name = "mjrelay-worker", version, about, long_about = None)]
pub struct Cli {
    /// Chat recipient stamped onto every notification
    #[arg(long, global = true, env = "MJ_RECIPIENT")]
    pub to: Option<String>,

    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum JobCommand {
    /// Generate a grid from a text prompt
    Imagine {
        /// Prompt words, including any `--ar`-style parameters
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Describe an image as prompt text
    Describe { image: String },
    /// Blend two to five images
    Blend {
        #[arg(required = true, num_args = 2..=5)]
        images: Vec<String>,
        #[arg(long, value_enum, default_value_t = Dimensions::Square)]
        dimensions: Dimensions,
    },
    /// Upscale one image of a finished grid
    Upscale {
        task_id: String,
        #[arg(value_parser = clap::value_parser!(u8).range(1..=4))]
        index: u8,
    },
    /// Make variations of one image of a finished grid
    Variation {
        task_id: String,
        #[arg(value_parser = clap::value_parser!(u8).range(1..=4))]
        index: u8,
    },
    /// Run a finished job again
    Reroll { task_id: String },
    /// Short-form change such as `1320585 U1`
    SimpleChange {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        content: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Dimensions {
    Portrait,
    Square,
    Landscape,
}

impl From<Dimensions> for BlendDimensions {
    fn from(value: Dimensions) -> Self {
        match value {
            Dimensions::Portrait => BlendDimensions::Portrait,
            Dimensions::Square => BlendDimensions::Square,
            Dimensions::Landscape => BlendDimensions::Landscape,
        }
    }
}

impl Cli {
    pub fn into_request(self) -> JobRequest {
        let submit = match self.command {
            JobCommand::Imagine { prompt } => SubmitRequest::Imagine {
                prompt: prompt.join(" "),
                base64: None,
            },
            JobCommand::Describe { image } => SubmitRequest::Describe { base64: image },
            JobCommand::Blend { images, dimensions } => SubmitRequest::Blend {
                base64_array: images,
                dimensions: dimensions.into(),
            },
            JobCommand::Upscale { task_id, index } => SubmitRequest::Change {
                action: ChangeAction::Upscale,
                index: Some(index),
                task_id,
            },
            JobCommand::Variation { task_id, index } => SubmitRequest::Change {
                action: ChangeAction::Variation,
                index: Some(index),
                task_id,
            },
            JobCommand::Reroll { task_id } => SubmitRequest::Change {
                action: ChangeAction::Reroll,
                index: None,
                task_id,
            },
            JobCommand::SimpleChange { content } => SubmitRequest::SimpleChange {
                content: content.join(" ").to_uppercase(),
            },
        };

        JobRequest {
            submit,
            recipient: self.to,
        }
    }
}
