use crate::core::Pipeline;
use crate::domain::model::OrderedRules;
use crate::utils::error::Result;

pub struct GenerateEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> GenerateEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        let rules = self.prepare().await?;

        tracing::info!("Writing {} rules...", rules.domains.len());
        let output_path = self.pipeline.load(rules).await?;
        tracing::info!("Output saved to: {}", output_path);

        Ok(output_path)
    }

    /// Everything `run` does except writing the output file.
    pub async fn dry_run(&self) -> Result<OrderedRules> {
        self.prepare().await
    }

    async fn prepare(&self) -> Result<OrderedRules> {
        tracing::info!("Starting rule generation...");

        tracing::info!("Reading sources...");
        let input = self.pipeline.extract().await?;
        tracing::info!(
            "Read {} remote, {} allow-listed and {} locally blocked domains",
            input.remote.len(),
            input.allow.len(),
            input.block.len()
        );

        tracing::info!("Reconciling...");
        let rules = self.pipeline.transform(input).await?;
        tracing::debug!("Stage counts: {:?}", rules.stages);

        Ok(rules)
    }
}
