//! CLI command dispatch.

use std::time::Duration;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::jobs::model::{HitlResponse, JobInputs};
use crate::metrics::weights::SkillStyle;

use super::args::{Args, Command};
use super::bootstrap::{self, CliContext};
use super::output;

/// Poll period for `create --wait`.
const WAIT_POLL_PERIOD: Duration = Duration::from_millis(500);

/// Run the parsed CLI command to completion.
pub async fn run(args: Args) -> Result<()> {
    bootstrap::init_logging(args.verbose);
    let ctx = bootstrap::initialize(&args).await?;

    let result = dispatch(&args, &ctx).await;
    ctx.service.shutdown().await;
    result
}

async fn dispatch(args: &Args, ctx: &CliContext) -> Result<()> {
    match &args.command {
        Command::Create {
            task,
            context,
            user,
            style,
            wait,
        } => {
            let style = style
                .as_deref()
                .map(SkillStyle::parse)
                .transpose()
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let inputs = JobInputs {
                task_description: task.clone(),
                user_context: context.clone(),
                user_id: user.clone(),
                style,
            };
            let id = ctx
                .service
                .create_skill(inputs)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            if args.json {
                println!("{}", serde_json::json!({ "job_id": id }));
            } else {
                println!("job {}", id);
            }

            if *wait {
                loop {
                    let job = ctx
                        .service
                        .job_status(id)
                        .await
                        .map_err(|e| anyhow::anyhow!("{}", e))?;
                    if job.is_terminal() {
                        output::print_job(&job, args.json);
                        break;
                    }
                    if job.prompt.is_some() && !args.json {
                        println!("job is waiting for input (see `status`)");
                    }
                    tokio::time::sleep(WAIT_POLL_PERIOD).await;
                }
            }
            Ok(())
        }

        Command::Status { job_id } => {
            let id = parse_job_id(job_id)?;
            let job = ctx
                .service
                .job_status(id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            output::print_job(&job, args.json);
            output::print_prompt(&job.prompt, args.json);
            Ok(())
        }

        Command::Respond {
            job_id,
            key,
            action,
            feedback,
        } => {
            let id = parse_job_id(job_id)?;
            let action = ctx.service.keywords().action_for(action);
            ctx.service
                .submit_response(
                    id,
                    key,
                    HitlResponse {
                        action,
                        feedback: feedback.clone(),
                    },
                )
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("response accepted");
            Ok(())
        }

        Command::Cancel { job_id } => {
            let id = parse_job_id(job_id)?;
            ctx.service
                .cancel_job(id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("job cancelled");
            Ok(())
        }

        Command::List => {
            for path in ctx.service.taxonomy().list_skills() {
                println!("{}", path);
            }
            Ok(())
        }

        Command::Export => {
            let xml = ctx
                .service
                .export_taxonomy()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("{}", xml);
            Ok(())
        }

        #[cfg(feature = "server")]
        Command::Serve { port } => {
            super::server::serve(ctx.service.clone(), *port).await
        }
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid job id {:?}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_must_be_uuids() {
        assert!(parse_job_id("not-a-uuid").is_err());
        assert!(parse_job_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
    }
}
