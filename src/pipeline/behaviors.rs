//! Per-step behaviors: precondition checks and command construction
//!
//! Planning a step never runs anything. It either fails with a
//! [`M3rulaError::Precondition`] or returns the command chain together with
//! the completion to apply once the chain has finished.

use crate::config::ToolPaths;
use crate::errors::{M3rulaError, Result};
use crate::models::StepKind;
use crate::pipeline::artifacts::{PTEBLOCK, SHCBLOCK_POST, SHCBLOCK_PRE, SHCBLOCK_UNTETH};
use crate::project::{ProjectState, RESTORE_DONE, UNKNOWN_GENERATOR, first_match};
use std::path::{Path, PathBuf};

const SIGNED_SEP_PATTERN: &str = "*signed-SEP.img4";
const IBOOT_PATTERN: &str = "*iBoot*.img4";
const TARGET_SEP_PATTERN: &str = "*target-SEP.im4p";

/// Continuation applied when the chain finishes. Consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Create an empty marker file on success
    TouchMarker(&'static str),
    /// Rename the tool output to a canonical name on success
    ResolveArtifact {
        target: &'static str,
        exclude: &'static [&'static str],
    },
}

/// Everything needed to run one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    pub commands: Vec<String>,
    pub completion: Option<Completion>,
    /// Extra line for the operator before the step runs
    pub note: Option<&'static str>,
}

impl StepPlan {
    fn new(commands: Vec<String>) -> Self {
        Self {
            commands,
            completion: None,
            note: None,
        }
    }

    fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = Some(completion);
        self
    }

    fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }
}

/// Inputs a behavior may look at
pub struct StepContext<'a> {
    pub project: &'a ProjectState,
    pub tools: &'a ToolPaths,
}

impl StepContext<'_> {
    fn rain(&self, args: &str) -> String {
        format!("{} {}", quote(&self.tools.rain), args)
    }

    fn merula_in_project(&self, args: &str) -> String {
        format!(
            "cd {} && {} {}",
            quote(self.project.root()),
            quote(&self.tools.merula),
            args
        )
    }

    fn rain_in_project(&self, args: &str) -> String {
        format!("cd {} && {}", quote(self.project.root()), self.rain(args))
    }

    fn firmware(&self) -> Result<PathBuf> {
        self.project
            .firmware()
            .ok_or_else(|| missing("Need IPSW and project"))
    }

    fn blob_and_generator(&self) -> Result<(PathBuf, &str)> {
        let blob = self.project.blob();
        let generator = self.project.generator();
        match (blob, generator) {
            (Some(_), Some(UNKNOWN_GENERATOR)) => Err(missing(
                "Generator could not be read from the blob, select another SHSH file",
            )),
            (Some(blob), Some(generator)) => Ok((blob, generator)),
            _ => Err(missing("Need IPSW/Blob/Gen/Project")),
        }
    }

    fn project_file(&self, name: &str) -> Result<PathBuf> {
        let path = self.project.path(name);
        if path.exists() {
            Ok(path)
        } else {
            Err(missing(&format!("Need {}", name)))
        }
    }

    fn matching_file(&self, pattern: &str, message: &str) -> Result<PathBuf> {
        first_match(self.project.root(), pattern)?.ok_or_else(|| missing(message))
    }
}

/// Check preconditions and build the command chain for `kind`
pub fn plan_step(kind: StepKind, ctx: &StepContext<'_>) -> Result<StepPlan> {
    match kind {
        StepKind::A9TetheredGetShcPre => get_shcblock(ctx, SHCBLOCK_PRE),
        StepKind::A9TetheredRestore => {
            let ipsw = ctx.firmware()?;
            let shc = ctx.project_file(SHCBLOCK_PRE)?;
            Ok(StepPlan::new(vec![
                ctx.rain("-D"),
                ctx.merula_in_project(&format!(
                    "-o --load-shcblock {} {}",
                    quote(&shc),
                    quote(&ipsw)
                )),
            ])
            .with_completion(Completion::TouchMarker(RESTORE_DONE)))
        }
        StepKind::A9TetheredGetShcPost => Ok(StepPlan::new(vec![ctx.rain_in_project("-g")])
            .with_completion(Completion::ResolveArtifact {
                target: SHCBLOCK_POST,
                exclude: &[SHCBLOCK_PRE, SHCBLOCK_POST],
            })),
        StepKind::A9TetheredGetPteblock => {
            let shc = ctx.project_file(SHCBLOCK_POST)?;
            let sep = ctx.matching_file(
                SIGNED_SEP_PATTERN,
                "No signed-SEP.img4 file in project directory",
            )?;
            Ok(StepPlan::new(vec![ctx.rain_in_project(&format!(
                "-g -i {} -C {}",
                quote(&sep),
                quote(&shc)
            ))])
            .with_completion(Completion::ResolveArtifact {
                target: PTEBLOCK,
                exclude: &[SHCBLOCK_PRE, SHCBLOCK_POST, PTEBLOCK],
            }))
        }
        StepKind::A9TetheredBoot => {
            let pte = ctx.project_file(PTEBLOCK)?;
            Ok(StepPlan::new(vec![
                ctx.rain(&format!("-TP {}", quote(&pte))),
            ]))
        }
        StepKind::A10TetheredRestore => {
            let ipsw = ctx.firmware()?;
            Ok(StepPlan::new(vec![
                ctx.rain("-D"),
                ctx.merula_in_project(&format!("-o {}", quote(&ipsw))),
            ])
            .with_completion(Completion::TouchMarker(RESTORE_DONE)))
        }
        StepKind::A10TetheredBoot => {
            let message = "Need iBoot.img4, signed-SEP.img4, target-SEP.im4p";
            let iboot = ctx.matching_file(IBOOT_PATTERN, message)?;
            let signed_sep = ctx.matching_file(SIGNED_SEP_PATTERN, message)?;
            let target_sep = ctx.matching_file(TARGET_SEP_PATTERN, message)?;
            Ok(StepPlan::new(vec![ctx.rain(&format!(
                "-t {} -i {} -p {}",
                quote(&iboot),
                quote(&signed_sep),
                quote(&target_sep)
            ))]))
        }
        StepKind::A9UntetheredGetShc => get_shcblock(ctx, SHCBLOCK_UNTETH),
        StepKind::A9UntetheredRestore => {
            let ipsw = ctx.firmware()?;
            let (blob, generator) = ctx.blob_and_generator()?;
            let shc = ctx.project_file(SHCBLOCK_UNTETH)?;
            Ok(StepPlan::new(vec![
                ctx.rain(&format!("-Db {}", shell_words::quote(generator))),
                ctx.merula_in_project(&format!(
                    "-w --load-shsh {} --load-shcblock {} {}",
                    quote(&blob),
                    quote(&shc),
                    quote(&ipsw)
                )),
            ])
            .with_completion(Completion::TouchMarker(RESTORE_DONE))
            .with_note("Note: A9 may fail, retry if needed"))
        }
        StepKind::A10UntetheredRestore => {
            let ipsw = ctx.firmware()?;
            let (blob, generator) = ctx.blob_and_generator()?;
            Ok(StepPlan::new(vec![
                ctx.rain(&format!("-Db {}", shell_words::quote(generator))),
                ctx.merula_in_project(&format!(
                    "-w --load-shsh {} {}",
                    quote(&blob),
                    quote(&ipsw)
                )),
            ])
            .with_completion(Completion::TouchMarker(RESTORE_DONE)))
        }
    }
}

/// Shared by the pre-restore and untethered SHC extraction steps
fn get_shcblock(ctx: &StepContext<'_>, target: &'static str) -> Result<StepPlan> {
    let ipsw = ctx.firmware()?;
    Ok(StepPlan::new(vec![
        ctx.rain("-D"),
        ctx.merula_in_project(&format!("--get-shcblock {}", quote(&ipsw))),
    ])
    .with_completion(Completion::ResolveArtifact {
        target,
        exclude: &[],
    }))
}

fn quote(path: &Path) -> String {
    shell_words::quote(&path.to_string_lossy()).into_owned()
}

fn missing(message: &str) -> M3rulaError {
    M3rulaError::Precondition(message.to_string())
}
