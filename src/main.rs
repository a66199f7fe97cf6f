use clap::Parser;
use http_client_manager::config::cli::parse_params;
use http_client_manager::config::{Command, SavedAction};
use http_client_manager::core::SavedRequestStore;
use http_client_manager::utils::{logger, validation::Validate};
use http_client_manager::{CliConfig, CommandResult, ManagerError, SavedRequest, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    let installed = if config.json_logs {
        logger::init_json_logger()
    } else {
        logger::init_cli_logger(config.verbose)
    };
    if let Err(e) = installed {
        eprintln!("⚠️ {}", e);
    }
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = config.validate() {
        fail(&e);
    }

    let settings = Settings::from_file(&config.config)
        .and_then(|settings| settings.validate().map(|_| settings));
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => fail(&e),
    };

    if let Err(e) = run(&settings, config.command).await {
        fail(&e);
    }
    Ok(())
}

fn fail(e: &ManagerError) -> ! {
    tracing::error!("❌ {} (Category: {:?})", e, e.category());
    eprintln!("❌ {}", e);
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

async fn run(settings: &Settings, command: Command) -> http_client_manager::Result<()> {
    let dispatcher = settings.dispatcher();
    let registry = dispatcher.factory().registry();

    match command {
        Command::Services => {
            for (id, service) in registry.discover()?.iter() {
                println!("{}\t{}\t{}", id, service.title, service.provider);
            }
        }
        Command::Operations { service } => {
            for (name, operation) in dispatcher.factory().get_operations(&service)? {
                println!(
                    "{}\t{} {}\t{}",
                    name,
                    operation.http_method,
                    operation.uri,
                    operation.summary.as_deref().unwrap_or("")
                );
            }
        }
        Command::Call { service, operation, params } => {
            let raw = parse_params(&params)?;
            let result = dispatcher.execute_raw(&service, &operation, &raw).await?;
            print_result(&result)?;
        }
        Command::Saved { action } => {
            let store = settings.request_store();
            match action {
                SavedAction::List => {
                    for request in store.list().await? {
                        println!(
                            "{}\t{}\t{}.{}",
                            request.id, request.label, request.service_api, request.command_name
                        );
                    }
                }
                SavedAction::Show { id } => {
                    let request = store
                        .load(&id)
                        .await?
                        .ok_or(ManagerError::SavedRequestNotFound { id })?;
                    print!("{}", serde_yaml::to_string(&request)?);
                }
                SavedAction::Run { id } => {
                    let result = dispatcher.execute_stored(&store, &id).await?;
                    print_result(&result)?;
                }
                SavedAction::Save { id, label, service, operation, params } => {
                    // fails early on unknown services or operations
                    dispatcher.factory().get_operation(&service, &operation)?;

                    let mut request = SavedRequest::new(id, label, service, operation);
                    for (name, value) in parse_params(&params)? {
                        request = request.with_parameter(&name, value);
                    }
                    store.save(&request).await?;
                    println!("✅ Saved request '{}'", request.id);
                }
                SavedAction::Delete { id } => {
                    if !store.delete(&id).await? {
                        return Err(ManagerError::SavedRequestNotFound { id });
                    }
                    println!("✅ Deleted saved request '{}'", id);
                }
            }
        }
    }
    Ok(())
}

fn print_result(result: &CommandResult) -> http_client_manager::Result<()> {
    tracing::info!("✅ HTTP {}", result.status);
    println!("{}", serde_json::to_string_pretty(&result.body)?);
    Ok(())
}
