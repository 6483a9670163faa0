use super::*;

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["oja-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn parses_db_seed_with_path() {
    let cli = Cli::try_parse_from(["oja-cli", "db", "seed", "--path", "seed.yaml"])
        .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Db {
            command: DbCommands::Seed { path },
        }) => assert_eq!(path, Some(PathBuf::from("seed.yaml"))),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["oja-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn quote_collects_repeated_items() {
    let cli = Cli::try_parse_from(["oja-cli", "quote", "--item", "12x3", "--item", "7:40X1"])
        .expect("expected valid cli args");

    let Some(Commands::Quote { items }) = cli.command else {
        panic!("expected quote command");
    };
    assert_eq!(
        items,
        vec![
            CartItem {
                product_id: 12,
                variant_id: None,
                quantity: 3
            },
            CartItem {
                product_id: 7,
                variant_id: Some(40),
                quantity: 1
            },
        ]
    );
}

#[test]
fn quote_requires_an_item() {
    assert!(Cli::try_parse_from(["oja-cli", "quote"]).is_err());
}

#[test]
fn cart_item_parse_errors() {
    assert!(parse_cart_item("12").is_err());
    assert!(parse_cart_item("12x0").is_err());
    assert!(parse_cart_item("abcx2").is_err());
    assert!(parse_cart_item("12:zzx2").is_err());
}

#[test]
fn orders_expire_ttl_override() {
    let cli = Cli::try_parse_from(["oja-cli", "orders", "expire", "--older-than-minutes", "90"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Orders {
            command: OrderCommands::Expire {
                older_than_minutes: Some(90)
            }
        })
    ));
}

#[test]
fn sessions_purge_defaults_to_a_week() {
    let cli =
        Cli::try_parse_from(["oja-cli", "sessions", "purge"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Sessions {
            command: SessionCommands::Purge { older_than_days: 7 }
        })
    ));
}

#[test]
fn link_supplier_takes_slug_and_email() {
    let cli = Cli::try_parse_from([
        "oja-cli",
        "users",
        "link-supplier",
        "--slug",
        "lagos-grains",
        "--email",
        "ops@lagosgrains.ng",
    ])
    .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Users {
            command: UserCommands::LinkSupplier { .. }
        })
    ));
}
