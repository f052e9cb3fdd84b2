//! # PMOPipeline
//!
//! Pipeline de découverte d'épisodes pour PMOPodcast.
//!
//! Une exécution enchaîne les étapes `Fetching → Filtering → Scoring →
//! Enqueuing → Finalizing` et produit un [`RunSummary`](pmomodel::RunSummary),
//! seul résultat visible de l'extérieur. Le pipeline est l'UNIQUE appelant
//! du routeur de dispatch : il ne touche jamais un client ou un store
//! directement, ce qui permet de remplacer n'importe quel module de
//! capacités sans le modifier.
//!
//! Isolation des échecs partiels :
//! - l'échec d'une préférence est enregistré dans le résumé, jamais fatal;
//! - l'échec de scoring d'un épisode le fait sauter, jamais avorter;
//! - un enqueue sans périphérique (ou en échec transitoire après retry)
//!   est reporté dans la file hors-ligne, et compte comme traité.
//!
//! Seules les erreurs de configuration (préférences absentes, credentials
//! manquants) avortent une exécution, avant l'étape `Fetching`.

pub mod config_ext;
pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod state;

pub use config_ext::PipelineConfigExt;
pub use error::{PipelineError, Result};
pub use pipeline::{DrainSummary, Pipeline, PipelineSettings};
pub use scheduler::Scheduler;
pub use state::RunState;
