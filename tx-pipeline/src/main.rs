use dotenv::dotenv;
use ethers::types::Address;
use std::process;
use std::str::FromStr;
use std::sync::Arc;

use tx_pipeline::config::Config;
use tx_pipeline::contracts::{ContractRegistry, SupportedToken};
use tx_pipeline::domain_types::FixedDecimal;
use tx_pipeline::math::{LoanMath, StaticRiskParameters, apr_from_daily_interest};
use tx_pipeline::permit::PermitPreparer;
use tx_pipeline::pipeline::{
    CompletionCallback, FinancialAction, PipelineBuilder, RunOutcome, StakeParams, StepOutput,
    TransactionPipeline,
};
use tx_pipeline::rpc::EvmRpc;
use tx_pipeline::wallet::{SignerProvider, WalletSession, format_address};

const USAGE: &str = "usage:
  tx-pipeline deposit <dllr|zusd> <amount>
  tx-pipeline withdraw <dllr|zusd> <amount> [--rewards]
  tx-pipeline stake <amount> <until-unix-timestamp> [delegatee]
  tx-pipeline liquidation <borrowed> <collateral>
  tx-pipeline apr <interest-per-day> <collateral>";

enum Command {
    Action(FinancialAction),
    Liquidation {
        borrowed: FixedDecimal,
        collateral: FixedDecimal,
    },
    Apr {
        interest_per_day: FixedDecimal,
        collateral: FixedDecimal,
    },
}

fn parse_decimal(value: Option<&String>, name: &str) -> Result<FixedDecimal, String> {
    let value = value.ok_or_else(|| format!("missing <{}>", name))?;
    FixedDecimal::from_str(value).map_err(|e| format!("invalid {}: {}", name, e))
}

fn parse_token(value: Option<&String>) -> Result<SupportedToken, String> {
    let value = value.ok_or_else(|| "missing <token>".to_string())?;
    SupportedToken::from_str(value)
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    let rest = args.get(1..).unwrap_or_default();
    match args.first().map(String::as_str) {
        Some("deposit") => Ok(Command::Action(FinancialAction::stability_deposit(
            parse_token(rest.first())?,
            parse_decimal(rest.get(1), "amount")?,
        ))),
        Some("withdraw") => Ok(Command::Action(FinancialAction::stability_withdraw(
            parse_token(rest.first())?,
            parse_decimal(rest.get(1), "amount")?,
            rest.iter().any(|a| a == "--rewards"),
        ))),
        Some("stake") => {
            let amount = parse_decimal(rest.first(), "amount")?;
            let until = rest
                .get(1)
                .ok_or_else(|| "missing <until-unix-timestamp>".to_string())?
                .parse::<u64>()
                .map_err(|e| format!("invalid lock timestamp: {}", e))?;
            let delegatee = match rest.get(2) {
                Some(raw) => Some(
                    Address::from_str(raw).map_err(|e| format!("invalid delegatee: {}", e))?,
                ),
                None => None,
            };
            Ok(Command::Action(FinancialAction::stake(
                amount,
                StakeParams { until, delegatee },
            )))
        }
        Some("liquidation") => Ok(Command::Liquidation {
            borrowed: parse_decimal(rest.first(), "borrowed")?,
            collateral: parse_decimal(rest.get(1), "collateral")?,
        }),
        Some("apr") => Ok(Command::Apr {
            interest_per_day: parse_decimal(rest.first(), "interest-per-day")?,
            collateral: parse_decimal(rest.get(1), "collateral")?,
        }),
        Some(other) => Err(format!("unknown command '{}'", other)),
        None => Err("missing command".to_string()),
    }
}

async fn run_action(config: Config, action: FinancialAction) -> Result<(), String> {
    let private_key = config.private_key.as_deref().ok_or_else(|| {
        format!(
            "{} is not set",
            tx_pipeline::config::env_vars::WALLET_PRIVATE_KEY
        )
    })?;

    let session = Arc::new(WalletSession::from_private_key(private_key, config.chain_id)?);
    let account = session
        .account()
        .ok_or_else(|| "Wallet failed to connect".to_string())?;
    log::info!("Connected wallet {}", format_address(&account));

    let rpc = Arc::new(EvmRpc::new(&config.rpc_url, session.clone())?);
    let builder = PipelineBuilder::new(
        ContractRegistry::from_config(&config),
        PermitPreparer::new(rpc.clone(), config.chain_id),
    );
    let pipeline = TransactionPipeline::new(session, rpc);

    let on_complete: CompletionCallback = Arc::new(|output: &StepOutput| match output.tx_hash() {
        Some(hash) => log::info!("Confirmed {}", hash),
        None => log::info!("Permit signed"),
    });
    let operations = builder
        .build(&action, account, Some(on_complete))
        .await
        .map_err(|e| e.to_string())?;
    pipeline
        .load(action.dialog_title(), operations, None)
        .map_err(|e| e.to_string())?;

    let mut updates = pipeline.subscribe();
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            let (step, total) = snapshot.progress();
            let title = snapshot
                .current_step()
                .map(|s| s.title.clone())
                .unwrap_or_default();
            log::info!("[{}/{}] {} - {}", step, total, title, snapshot.status);
            if snapshot.status.is_terminal() {
                break;
            }
        }
    });

    let handle = pipeline.start().map_err(|e| e.to_string())?;
    let outcome = handle
        .await
        .map_err(|e| format!("Pipeline task failed: {}", e))?;
    // Closes the snapshot channel so the watcher exits
    drop(pipeline);
    let _ = watcher.await;

    match outcome {
        RunOutcome::Succeeded(outputs) => {
            log::info!("{} finished after {} step(s)", action.dialog_title(), outputs.len());
            Ok(())
        }
        RunOutcome::Failed(error) => Err(error.to_string()),
        RunOutcome::Discarded => Err("Pipeline was discarded".to_string()),
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            process::exit(2);
        }
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match command {
        Command::Action(action) => run_action(config, action).await,
        Command::Liquidation { borrowed, collateral } => {
            let math = LoanMath::from_source(&StaticRiskParameters {
                maintenance_ratio: config.maintenance_ratio,
            });
            match math.liquidation_price(borrowed, collateral) {
                Some(price) => {
                    println!("{}", price);
                    Ok(())
                }
                None => Err("collateral is zero or the result overflows".to_string()),
            }
        }
        Command::Apr {
            interest_per_day,
            collateral,
        } => match apr_from_daily_interest(interest_per_day, collateral) {
            Some(apr) => {
                println!("{}%", apr);
                Ok(())
            }
            None => Err("collateral is zero or the result overflows".to_string()),
        },
    };

    if let Err(e) = result {
        log::error!("{}", e);
        process::exit(1);
    }
}
