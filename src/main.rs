use crm_client::{AppError, AuthStatus, Config, ContactPage, CrmClient, SortOrder, init_tracing};

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  login <username> <password>          sign in and store the session");
    eprintln!("  logout                               forget the stored session");
    eprintln!("  whoami                               show the signed-in user");
    eprintln!("  list [page] [page-size] [sort] [order]  list contacts");
    eprintln!("  health                               check that the backend is reachable");
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let mut args = std::env::args();
    let bin_name = args.next().unwrap_or_else(|| "crm-client".to_string());
    let Some(command) = args.next() else {
        print_usage(&bin_name);
        std::process::exit(2);
    };
    let rest: Vec<String> = args.collect();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);

    let client = match CrmClient::new(&config) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Failed to initialize client: {err}");
            std::process::exit(1);
        }
    };

    let result = match (command.as_str(), rest.as_slice()) {
        ("login", [username, password]) => login(&client, username, password).await,
        ("logout", []) => {
            client.auth().logout();
            println!("Signed out");
            Ok(())
        }
        ("whoami", []) => whoami(&client).await,
        ("list", args) if args.len() <= 4 => list(&client, args).await,
        ("health", []) => {
            let status = client.contacts().health().await;
            println!("{}", status.message);
            if status.healthy { Ok(()) } else { std::process::exit(1) }
        }
        _ => {
            print_usage(&bin_name);
            std::process::exit(2);
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        if err.requires_sign_in() {
            eprintln!("Run `{bin_name} login <username> <password>` to sign in again.");
        }
        std::process::exit(1);
    }
}

async fn login(client: &CrmClient, username: &str, password: &str) -> Result<(), AppError> {
    let user = client.auth().login(username, password).await?;
    println!("Signed in as {} ({})", user.display_name(), user.username);
    Ok(())
}

async fn whoami(client: &CrmClient) -> Result<(), AppError> {
    match client.auth().bootstrap().await {
        AuthStatus::Authenticated => {
            if let Some(user) = client.auth().current_user() {
                let roles = user.roles.iter().cloned().collect::<Vec<_>>().join(", ");
                println!("{} ({}) roles: [{}]", user.display_name(), user.username, roles);
            }
            Ok(())
        }
        _ => Err(AppError::Authentication("Not signed in".to_string())),
    }
}

async fn list(client: &CrmClient, args: &[String]) -> Result<(), AppError> {
    if client.auth().bootstrap().await != AuthStatus::Authenticated {
        return Err(AppError::Authentication("Not signed in".to_string()));
    }

    let mut query = client.default_query().clone();
    if let Some(page_size) = args.get(1) {
        query = query.with_page_size(parse_number(page_size, "page size")?)?;
    }
    if let Some(field) = args.get(2) {
        let order = args.get(3).map(|order| order.parse::<SortOrder>()).transpose()?.unwrap_or(SortOrder::Asc);
        query = query.with_sort(Some(field.as_str()), Some(order));
    }
    if let Some(page) = args.first() {
        query = query.with_page(parse_number(page, "page")?)?;
    }

    let controller = crm_client::ListQueryController::with_query(client.contacts().clone(), query);
    let page = controller.fetch().await?;
    print_page(&page);
    Ok(())
}

fn parse_number(raw: &str, what: &str) -> Result<u32, AppError> {
    raw.parse().map_err(|_| AppError::BadRequest(format!("Invalid {}: '{}'", what, raw)))
}

fn print_page(page: &ContactPage) {
    let (start, end) = page.pagination.item_range();
    println!(
        "Showing {}-{} of {} contacts (page {}/{}, sorted by {} {})",
        start,
        end,
        page.pagination.total,
        page.pagination.current_page,
        page.pagination.total_pages,
        page.query.sort_field(),
        page.query.sort_order()
    );

    for contact in &page.contacts {
        println!(
            "{:>6}  {:<24} {:<32} {}",
            contact.id,
            contact.full_name(),
            contact.email.as_deref().unwrap_or("-"),
            contact.company.as_deref().unwrap_or("-")
        );
    }
}
