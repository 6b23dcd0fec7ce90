use super::args::{Cli, Command};
use anyhow::{Context, Result};
use batchstore::execution::StepExecutionDocument;
use batchstore::sequence::DEFAULT_NOTE;
use batchstore::{BatchStore, JobExecutionRef, RepositoryConfig, StepExecution, StepExecutionDao};

pub struct App {
    repository: BatchStore,
}

impl App {
    pub async fn open(cli: &Cli) -> Result<Self> {
        let config = RepositoryConfig::default()
            .data_dir(&cli.data_dir)
            .sequence_collection(&cli.sequence_collection)
            .sequence_strategy(cli.strategy);
        let repository = BatchStore::open(config)
            .await
            .with_context(|| format!("Failed to open repository in '{}'", cli.data_dir.display()))?;
        Ok(Self { repository })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Seed {
                name,
                initial,
                note,
            } => self.seed(&name, initial, note.as_deref()).await,
            Command::Next { name, count } => self.next(&name, count).await,
            Command::List {
                job_execution_id,
                instance,
            } => {
                self.list(JobExecutionRef::new(job_execution_id, instance))
                    .await
            }
            Command::Show {
                job_execution_id,
                step_id,
                instance,
            } => {
                self.show(JobExecutionRef::new(job_execution_id, instance), step_id)
                    .await
            }
        }
    }

    async fn seed(&self, name: &str, initial: i64, note: Option<&str>) -> Result<()> {
        let counter = self
            .repository
            .seed_sequence(name, initial, note.unwrap_or(DEFAULT_NOTE))
            .await
            .with_context(|| format!("Failed to seed sequence '{}'", name))?;
        println!("{} = {}", counter.id, counter.value);
        Ok(())
    }

    async fn next(&self, name: &str, count: u32) -> Result<()> {
        let sequence = self.repository.sequence(name);
        for _ in 0..count {
            let value = sequence
                .next_long()
                .await
                .with_context(|| format!("Failed to allocate from sequence '{}'", name))?;
            println!("{}", value);
        }
        Ok(())
    }

    async fn list(&self, job_execution: JobExecutionRef) -> Result<()> {
        let steps = self
            .repository
            .step_executions()
            .find_by_job_execution(&job_execution)
            .await?;
        if steps.is_empty() {
            println!("No step executions for job execution {}", job_execution.id);
            return Ok(());
        }

        println!(
            "{:>8} {:>7}  {:<24} {:<10} {:>6} {:>6}  {}",
            "ID", "VERSION", "STEP", "STATUS", "READ", "WRITE", "EXIT"
        );
        for step in &steps {
            println!("{}", summary_line(step));
        }
        Ok(())
    }

    async fn show(&self, job_execution: JobExecutionRef, step_id: i64) -> Result<()> {
        let step = self
            .repository
            .step_executions()
            .get(&job_execution, step_id)
            .await?;
        let document = StepExecutionDocument::from_execution(&step, usize::MAX)?.to_document()?;
        println!("{}", serde_json::to_string_pretty(&document)?);
        Ok(())
    }
}

fn summary_line(step: &StepExecution) -> String {
    format!(
        "{:>8} {:>7}  {:<24} {:<10} {:>6} {:>6}  {}",
        step.id().unwrap_or_default(),
        step.version().unwrap_or_default(),
        step.name.as_deref().unwrap_or("-"),
        step.status.map(|status| status.to_string()).unwrap_or_default(),
        step.read_count,
        step.write_count,
        step.exit_status.exit_code
    )
}
