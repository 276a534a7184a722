use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const HEADER: [&str; 6] = ["type", "expense", "user", "amount", "balance", "phone"];

pub fn phone(user: usize) -> String {
    format!("+1555{:07}", user)
}

/// Writes a command stream registering `users` users followed by `expenses`
/// random expenses, each paid by one user and shared with one to three others.
///
/// Returns the number of balances the stream produces.
pub fn generate_commands(
    path: &Path,
    users: usize,
    expenses: usize,
    seed: u64,
) -> Result<usize, Error> {
    let mut rng = StdRng::seed_from_u64(seed);
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER)?;

    for user in 1..=users {
        wtr.write_record(["register", "", "", "", "", phone(user).as_str()])?;
    }

    let ids: Vec<usize> = (1..=users).collect();
    let mut balances = 0;
    for i in 1..=expenses {
        let label = format!("expense {}", i);
        let size = rng.gen_range(2..=4);
        let mut participants: Vec<usize> =
            ids.choose_multiple(&mut rng, size).copied().collect();
        let creator = participants.remove(0).to_string();
        let cents: u64 = rng.gen_range(100..=50_000);
        let amount = format!("{}.{:02}", cents / 100, cents % 100);

        wtr.write_record([
            "contribute",
            label.as_str(),
            creator.as_str(),
            amount.as_str(),
            "",
            "",
        ])?;
        for beneficiary in &participants {
            let beneficiary = beneficiary.to_string();
            wtr.write_record(["benefit", label.as_str(), beneficiary.as_str(), "", "", ""])?;
        }
        wtr.write_record(["split", label.as_str(), creator.as_str(), "", "", ""])?;
        balances += participants.len();
    }

    wtr.flush()?;
    Ok(balances)
}
