use std::path::Path;
use crate::{emit_success, CustomerCommand, LicenseCommand, OutputMode};
use relationship::config::{self, RelationshipConfig};
use relationship::dispatch::wait_for;
use relationship::ui::{self, Icons};
use relationship::{seeds, Customer, License, StoreError, Stores};

/// Block on a store operation and surface its `StoreError`
fn await_store<T, F>(start: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(Box<dyn FnOnce(Result<T, StoreError>) + Send + 'static>),
{
    let result = wait_for(start)
        .map_err(|_| anyhow::anyhow!("store operation finished without a result"))?;
    Ok(result?)
}

fn parse_license(entry: &str, customer_id: &str) -> anyhow::Result<License> {
    let Some((id, serial)) = entry.split_once(':') else {
        anyhow::bail!("invalid license '{}', expected id:serial", entry);
    };
    Ok(License::new(id, serial, customer_id))
}

pub fn run_init(output_mode: OutputMode, path: &Path, database: &Path, force: bool) -> anyhow::Result<()> {
    let config = RelationshipConfig {
        database: Some(database.display().to_string()),
    };
    config::write_config(path, &config, force)?;

    if output_mode.is_human() {
        ui::success(&format!("Wrote {}", path.display()));
        ui::info("Database", &database.display().to_string());
    } else {
        emit_success(output_mode, "init", serde_json::json!({
            "config": path.display().to_string(),
            "database": database.display().to_string(),
        }))?;
    }
    Ok(())
}

pub fn run_seed(output_mode: OutputMode, stores: &Stores) -> anyhow::Result<()> {
    let customers = seeds::populate(stores)?;

    if output_mode.is_human() {
        println!("{} Seeded {} customers", Icons::SEED, customers.len());
        println!("{}", ui::customers_table(&customers));
    } else {
        emit_success(output_mode, "seed", serde_json::to_value(&customers)?)?;
    }
    Ok(())
}

pub fn run_stats(output_mode: OutputMode, stores: &Stores, database: &Path) -> anyhow::Result<()> {
    let stats = stores.context().call(|context| context.stats())?;

    if output_mode.is_human() {
        ui::header("Relationship Statistics");
        ui::info(&format!("{} Database", Icons::DATABASE), &database.display().to_string());
        println!("{}", ui::stats_table(&stats));
    } else {
        emit_success(output_mode, "stats", serde_json::to_value(stats)?)?;
    }
    Ok(())
}

pub fn run_customers(output_mode: OutputMode, stores: &Stores, command: CustomerCommand) -> anyhow::Result<()> {
    let customers = &stores.customers;

    match command {
        CustomerCommand::List => {
            let mut all = await_store(|done| customers.fetch_customers(done))?;
            all.sort_by(|a, b| a.id.cmp(&b.id));
            if output_mode.is_human() {
                if all.is_empty() {
                    ui::warn("No customers");
                } else {
                    println!("{}", ui::customers_table(&all));
                }
            } else {
                emit_success(output_mode, "customers.list", serde_json::to_value(&all)?)?;
            }
        }
        CustomerCommand::Show { id } => {
            let customer = await_store(|done| customers.fetch_customer(&id, done))?;
            if output_mode.is_human() {
                println!("{} {}", Icons::PERSON, customer);
            } else {
                emit_success(output_mode, "customers.show", serde_json::to_value(&customer)?)?;
            }
        }
        CustomerCommand::Add { id, name, licenses } => {
            let mut customer = Customer::new(id, name);
            for entry in &licenses {
                customer.licenses.push(parse_license(entry, &customer.id)?);
            }
            let created = await_store(|done| customers.create_customer(customer, done))?;
            if output_mode.is_human() {
                ui::success(&format!("Created {}", created));
            } else {
                emit_success(output_mode, "customers.add", serde_json::to_value(&created)?)?;
            }
        }
        CustomerCommand::Rename { id, name } => {
            let updated = await_store(|done| customers.update_customer(Customer::new(id, name), done))?;
            if output_mode.is_human() {
                ui::success(&format!("Updated {}", updated));
            } else {
                emit_success(output_mode, "customers.rename", serde_json::to_value(&updated)?)?;
            }
        }
        CustomerCommand::Delete { id } => {
            await_store(|done| customers.delete_customer(&id, done))?;
            if output_mode.is_human() {
                ui::success(&format!("Deleted customer {}", id));
            } else {
                emit_success(output_mode, "customers.delete", serde_json::json!({ "id": id }))?;
            }
        }
    }
    Ok(())
}

pub fn run_licenses(output_mode: OutputMode, stores: &Stores, command: LicenseCommand) -> anyhow::Result<()> {
    let licenses = &stores.licenses;

    match command {
        LicenseCommand::List { customer } => {
            let owner = await_store(|done| stores.customers.fetch_customer(&customer, done))?;
            let mut owned = await_store(|done| licenses.fetch_licenses(&owner, done))?;
            owned.sort_by(|a, b| a.id.cmp(&b.id));
            if output_mode.is_human() {
                if owned.is_empty() {
                    ui::warn(&format!("No licenses for {}", owner.id));
                } else {
                    println!("{}", ui::licenses_table(&owned));
                }
            } else {
                emit_success(output_mode, "licenses.list", serde_json::to_value(&owned)?)?;
            }
        }
        LicenseCommand::Show { id } => {
            let license = await_store(|done| licenses.fetch_license(&id, done))?;
            if output_mode.is_human() {
                println!("{} {}", Icons::KEY, license);
            } else {
                emit_success(output_mode, "licenses.show", serde_json::to_value(&license)?)?;
            }
        }
        LicenseCommand::Add { customer, id, serial } => {
            // Only the id matters for resolving the parent row
            let owner = Customer::new(customer, String::new());
            let license = License::new(id, serial, owner.id.clone());
            let created = await_store(|done| licenses.create_license(license, &owner, done))?;
            if output_mode.is_human() {
                ui::success(&format!("Created {}", created));
            } else {
                emit_success(output_mode, "licenses.add", serde_json::to_value(&created)?)?;
            }
        }
        LicenseCommand::Update { id, serial } => {
            let current = await_store(|done| licenses.fetch_license(&id, done))?;
            let license = License::new(current.id, serial, current.customer_id);
            let updated = await_store(|done| licenses.update_license(license, done))?;
            if output_mode.is_human() {
                ui::success(&format!("Updated {}", updated));
            } else {
                emit_success(output_mode, "licenses.update", serde_json::to_value(&updated)?)?;
            }
        }
        LicenseCommand::Delete { id } => {
            await_store(|done| licenses.delete_license(&id, done))?;
            if output_mode.is_human() {
                ui::success(&format!("Deleted license {}", id));
            } else {
                emit_success(output_mode, "licenses.delete", serde_json::json!({ "id": id }))?;
            }
        }
    }
    Ok(())
}
