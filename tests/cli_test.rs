use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/dinner.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "balance,expense,creditor,debtor,amount,creditor_consent,debtor_consent,payment,deletion",
        ))
        // settled by user 2
        .stdout(predicate::str::contains("1,1,1,2,10,accepted,accepted,confirmed,none"))
        // rejected by user 3
        .stdout(predicate::str::contains("2,1,1,3,10,pending,rejected,unpaid,none"));

    Ok(())
}

#[test]
fn test_cli_unregistered_contact_is_settled_by_creditor() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "type, expense, user, amount, balance, phone").unwrap();
    writeln!(csv, "register, , , , , +15550000001").unwrap();
    writeln!(csv, "contribute, taxi, 1, 12.50, ,").unwrap();
    writeln!(csv, "benefit, taxi, , , , +15550000077").unwrap();
    writeln!(csv, "split, taxi, 1, , ,").unwrap();
    writeln!(csv, "accept, , 1, , 1,").unwrap();
    writeln!(csv, "accept_payment, , 1, , 1,").unwrap();

    let mut cmd = Command::new(cargo_bin!("splitledger"));
    cmd.arg(csv.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "1,1,1,2,6.25,accepted,accepted,confirmed,none",
        ));
}

#[test]
fn test_cli_mutual_deletion_removes_balance() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "type, expense, user, amount, balance, phone").unwrap();
    writeln!(csv, "register, , , , , +15550000001").unwrap();
    writeln!(csv, "register, , , , , +15550000002").unwrap();
    writeln!(csv, "contribute, lunch, 1, 8, ,").unwrap();
    writeln!(csv, "benefit, lunch, 2, , ,").unwrap();
    writeln!(csv, "split, lunch, 1, , ,").unwrap();
    writeln!(csv, "delete, , 2, , 1,").unwrap();
    writeln!(csv, "delete, , 1, , 1,").unwrap();

    let mut cmd = Command::new(cargo_bin!("splitledger"));
    cmd.arg(csv.path());

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1, "only the header should remain");
}

#[test]
fn test_cli_scale_from_environment() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "type, expense, user, amount, balance, phone").unwrap();
    writeln!(csv, "register, , , , , +15550000001").unwrap();
    writeln!(csv, "register, , , , , +15550000002").unwrap();
    writeln!(csv, "contribute, rent, 1, 1000, ,").unwrap();
    writeln!(csv, "benefit, rent, 2, , ,").unwrap();
    writeln!(csv, "split, rent, 1, , ,").unwrap();

    let mut cmd = Command::new(cargo_bin!("splitledger"));
    cmd.env("SPLITLEDGER_SCALE", "0").arg(csv.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,1,1,2,500,pending,pending,unpaid,none"));
}
