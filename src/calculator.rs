//! Calculation facade: resolve, derive, classify and, when asked, search
//! for the connection count.

use serde::Serialize;
use tracing::info;

use crate::autosize::{self, SearchConfig, SearchOutcome};
use crate::catalog::{Catalog, Families, Supported};
use crate::configurator::Configurator;
use crate::error::Result;
use crate::resolver;
use crate::types::{CalculationRequest, ConfigurationRequest, MessageKind, ResponseMessage};

/// Complete answer to one request: the `{message, incoming, answer}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calculation {
    pub message: ResponseMessage,
    pub incoming: ConfigurationRequest,
    pub answer: Families,
}

#[derive(Debug, Clone)]
pub struct Calculator {
    catalog: Catalog,
    search: SearchConfig,
}

impl Calculator {
    pub fn new(catalog: Catalog, search: SearchConfig) -> Self {
        Self { catalog, search }
    }

    pub fn builtin() -> Result<Self> {
        Ok(Self::new(Catalog::builtin()?, SearchConfig::default()))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn supported(&self) -> Supported {
        self.catalog.supported()
    }

    pub fn calculate(&self, request: &CalculationRequest) -> Result<Calculation> {
        let resolved = resolver::resolve(request, &self.catalog)?;
        self.calculate_resolved(resolved)
    }

    pub fn calculate_resolved(&self, request: ConfigurationRequest) -> Result<Calculation> {
        let outcome = autosize::search(request.connections, &self.search, |connections| {
            self.attempt(&request, connections)
        })?;

        let calc = match outcome {
            SearchOutcome::Direct { value, .. } | SearchOutcome::Infeasible { value, .. } => value,
            SearchOutcome::Recalculated {
                original,
                connections,
                value,
            } => recalculated(value, original, connections, self.search.floor),
        };
        info!(
            dimension = %calc.incoming.dimension.name,
            connections = calc.incoming.connections,
            outcome = calc.message.kind.code(),
            parameters = calc.answer.parameter_count(),
            "calculation complete"
        );
        Ok(calc)
    }

    /// One full derivation at a fixed connection count.
    pub fn attempt(&self, request: &ConfigurationRequest, connections: u32) -> Result<(Calculation, bool)> {
        let mut incoming = request.clone();
        incoming.connections = connections;

        let mut configurator = Configurator::init(&self.catalog, incoming.clone())?;
        if let Some(message) = configurator.overload_message() {
            let calc = Calculation {
                message,
                incoming,
                answer: Families::default(),
            };
            return Ok((calc, true));
        }

        configurator.process_request()?;
        let evaluation = configurator.evaluate_resources()?;
        let calc = Calculation {
            message: evaluation.message,
            incoming,
            answer: configurator.into_families(),
        };
        Ok((calc, evaluation.over_utilizing))
    }
}

fn recalculated(mut calc: Calculation, original: u32, connections: u32, seed: u32) -> Calculation {
    let original = if original == 0 {
        format!("0 (auto, seeded at {seed})")
    } else {
        original.to_string()
    };
    calc.message.text.push_str(&format!(
        "\n!!!! Connections recalculated Original: {original} New Value {connections} \
         plus additional 2 for administrative use !!!\n\n"
    ));
    calc.message.kind = MessageKind::ConnectionRecalculated;
    calc.message.name = MessageKind::ConnectionRecalculated.label().to_string();
    calc
}
