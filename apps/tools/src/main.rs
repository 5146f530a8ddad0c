use anyhow::Result;
use clap::{Parser, Subcommand};
use scoring::ScanPolicy;
use server_api::ApiContext;
use shared::{domain::CodeKind, error::ApiException, protocol::RegisterTeamRequest};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/hunt.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the clue and code catalog, optionally with the sample teams.
    Seed {
        #[arg(long)]
        with_sample_teams: bool,
    },
    CreateTeam {
        name: String,
        password: String,
        #[arg(long)]
        members: Option<u8>,
    },
    /// Stop the game, zero every team and clear scan history.
    Reset,
    ListCodes,
    Leaderboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = ApiContext {
        storage: Storage::new(&cli.database_url).await?,
        scan_policy: ScanPolicy::default(),
        admin_password: String::new(),
    };

    match cli.command {
        Command::Seed { with_sample_teams } => {
            let (clues, codes) = ctx.storage.seed_default_catalog().await?;
            println!("seeded clues={clues} codes={codes}");
            if with_sample_teams {
                for sample in storage::sample_teams() {
                    let team_id = ctx
                        .storage
                        .upsert_team(sample.name, sample.password, sample.member_count)
                        .await?;
                    println!("team_id={} name={}", team_id.0, sample.name);
                }
            }
        }
        Command::CreateTeam {
            name,
            password,
            members,
        } => {
            let team = server_api::register_team(
                &ctx,
                RegisterTeamRequest {
                    name,
                    password,
                    member_count: members,
                },
            )
            .await
            .map_err(ApiException::from)?;
            println!("created team_id={} name={}", team.team_id.0, team.name);
        }
        Command::Reset => {
            let summary = server_api::reset_all(&ctx)
                .await
                .map_err(ApiException::from)?;
            println!(
                "reset teams={} scans_cleared={}",
                summary.teams_reset, summary.scans_cleared
            );
        }
        Command::ListCodes => {
            for code in ctx.storage.list_codes().await? {
                match code.kind {
                    CodeKind::Correct { clue_number } => {
                        let clue = clue_number.map_or_else(|| "?".to_string(), |n| n.to_string());
                        println!("{}\tcorrect\tclue={clue}", code.value);
                    }
                    CodeKind::Decoy { .. } => println!("{}\tdecoy", code.value),
                }
            }
        }
        Command::Leaderboard => {
            let board = server_api::leaderboard(&ctx)
                .await
                .map_err(ApiException::from)?;
            for (rank, team) in board.iter().enumerate() {
                println!(
                    "{:>2}. {:<24} points={:<3} progress={}/{}",
                    rank + 1,
                    team.name,
                    team.points,
                    team.progress,
                    shared::domain::MAX_PROGRESS
                );
            }
        }
    }

    Ok(())
}
