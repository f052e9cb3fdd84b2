//! # pmoscorer - Évaluation de pertinence pour PMOPodcast
//!
//! Cette crate note la pertinence des épisodes découverts par rapport aux
//! préférences de l'utilisateur, via un endpoint compatible
//! chat-completions, et expose le module de capacités `scorer` au routeur
//! de dispatch.
//!
//! Le contrat avec le modèle de langage est strict : la réponse doit être
//! un objet JSON (les clôtures markdown ```json sont tolérées et
//! retirées). Une réponse malformée est une erreur domaine, jamais une
//! approbation implicite : une panne du fournisseur reste ainsi visible
//! dans le résumé d'exécution.

pub mod client;
pub mod config_ext;
pub mod error;
pub mod module;
pub mod scorer;

pub use client::LlmScorer;
pub use config_ext::ScorerConfigExt;
pub use error::{Result, ScorerError};
pub use module::ScorerModule;
pub use scorer::RelevanceScorer;
