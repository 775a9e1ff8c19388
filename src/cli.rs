// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    )
}

fn id_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(i64))
        .help(help)
}

fn amount_arg(name: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .allow_hyphen_values(true)
}

fn reference_arg() -> Arg {
    Arg::new("ref")
        .long("ref")
        .help("Caller reference; repeating it does not record the movement twice")
}

fn config_cmd() -> Command {
    Command::new("config")
        .about("Show or change settings")
        .subcommand_required(true)
        .subcommand(json_flags(Command::new("list").about("List all settings")))
        .subcommand(Command::new("get").arg(Arg::new("key").required(true)))
        .subcommand(
            Command::new("set")
                .arg(Arg::new("key").required(true))
                .arg(Arg::new("value").required(true)),
        )
}

fn import_cmd() -> Command {
    Command::new("import")
        .about("Load catalog data")
        .subcommand_required(true)
        .subcommand(
            Command::new("employees")
                .about("Employees from a JSON array")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("policies")
                .about("Policies with their receipts from a JSON array")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(
            Command::new("rates")
                .about("Commission rates from CSV: insurer,product,pct")
                .arg(Arg::new("path").required(true)),
        )
}

fn payroll_cmd() -> Command {
    Command::new("payroll")
        .about("Generate and manage payroll runs")
        .subcommand_required(true)
        .subcommand(
            Command::new("generate")
                .about("Attribute commissions and write a phase-one draft")
                .arg(Arg::new("start").long("start").required(true))
                .arg(Arg::new("end").long("end").required(true))
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .default_value("full")
                        .value_parser(["full", "salary_only", "commission_only"]),
                )
                .arg(Arg::new("out").long("out").required(true)),
        )
        .subcommand(
            Command::new("distribute")
                .about("Split shared commissions and build the run from a draft")
                .arg(Arg::new("draft").long("draft").required(true))
                .arg(Arg::new("edits").long("edits").help("Pending edits JSON"))
                .arg(Arg::new("out").long("out").help("Write the phase-two draft here"))
                .arg(
                    Arg::new("save")
                        .long("save")
                        .action(ArgAction::SetTrue)
                        .help("Persist the run as saved"),
                ),
        )
        .subcommand(json_flags(Command::new("list").about("List stored runs")))
        .subcommand(json_flags(
            Command::new("show").arg(id_arg("id", "Run id")),
        ))
        .subcommand(
            Command::new("edit")
                .about("Edit a generated or saved run")
                .arg(id_arg("id", "Run id"))
                .arg(
                    Arg::new("employee")
                        .long("employee")
                        .value_parser(value_parser!(i64)),
                )
                .arg(amount_arg("deductions").requires("employee"))
                .arg(amount_arg("loan-grant").requires("employee"))
                .arg(amount_arg("loan-collection").requires("employee"))
                .arg(
                    Arg::new("receipt")
                        .long("receipt")
                        .value_parser(value_parser!(i64)),
                )
                .arg(amount_arg("base-pct").requires("receipt"))
                .arg(amount_arg("vendor-pct").requires("receipt")),
        )
        .subcommand(
            Command::new("close")
                .arg(id_arg("id", "Run id"))
                .arg(
                    Arg::new("acknowledge-overpayment")
                        .long("acknowledge-overpayment")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("pay").arg(id_arg("id", "Run id")))
        .subcommand(
            Command::new("delete")
                .about("Delete a run, reversing it if it was closed")
                .arg(id_arg("id", "Run id")),
        )
}

fn loan_cmd() -> Command {
    Command::new("loan")
        .about("Employee loans")
        .subcommand_required(true)
        .subcommand(
            Command::new("grant")
                .arg(
                    Arg::new("employee")
                        .long("employee")
                        .required(true)
                        .value_parser(value_parser!(i64)),
                )
                .arg(amount_arg("amount").required(true))
                .arg(Arg::new("date").long("date").required(true))
                .arg(Arg::new("reason").long("reason").default_value(""))
                .arg(reference_arg()),
        )
        .subcommand(
            Command::new("pay")
                .arg(id_arg("id", "Loan id"))
                .arg(amount_arg("amount").required(true))
                .arg(Arg::new("date").long("date").required(true))
                .arg(Arg::new("note").long("note").default_value(""))
                .arg(reference_arg())
                .arg(
                    Arg::new("acknowledge-overpayment")
                        .long("acknowledge-overpayment")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("adjust")
                .arg(id_arg("id", "Loan id"))
                .arg(amount_arg("amount").required(true))
                .arg(Arg::new("date").long("date").required(true))
                .arg(Arg::new("note").long("note").default_value(""))
                .arg(reference_arg()),
        )
        .subcommand(
            Command::new("settle")
                .arg(id_arg("id", "Loan id"))
                .arg(Arg::new("date").long("date").required(true))
                .arg(Arg::new("note").long("note").default_value("write-off"))
                .arg(reference_arg()),
        )
        .subcommand(json_flags(
            Command::new("list")
                .arg(
                    Arg::new("employee")
                        .long("employee")
                        .value_parser(value_parser!(i64)),
                )
                .arg(
                    Arg::new("active")
                        .long("active")
                        .action(ArgAction::SetTrue),
                ),
        ))
        .subcommand(json_flags(
            Command::new("show").arg(id_arg("id", "Loan id")),
        ))
}

fn export_cmd() -> Command {
    Command::new("export")
        .about("Export data")
        .subcommand_required(true)
        .subcommand(
            Command::new("payroll")
                .arg(id_arg("id", "Run id"))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("csv")
                        .value_parser(["csv", "json"]),
                )
                .arg(Arg::new("out").long("out").required(true)),
        )
}

pub fn build_cli() -> Command {
    Command::new("agencypay")
        .about("Insurance agency payroll and commissions")
        .version(clap::crate_version!())
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .help("Database file (overrides AGENCYPAY_DB)"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(config_cmd())
        .subcommand(import_cmd())
        .subcommand(payroll_cmd())
        .subcommand(loan_cmd())
        .subcommand(export_cmd())
        .subcommand(json_flags(
            Command::new("doctor").about("Check data consistency"),
        ))
}
