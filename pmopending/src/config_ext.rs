//! Extension de pmoconfig pour la file d'attente hors-ligne

use std::path::PathBuf;

/// Trait d'extension pour pmoconfig::Config
pub trait PendingConfigExt {
    /// Retourne le chemin de la base de données des épisodes en attente
    fn pending_db_path(&self) -> PathBuf;
}

impl PendingConfigExt for pmoconfig::Config {
    fn pending_db_path(&self) -> PathBuf {
        // Utilise get_managed_dir pour créer le répertoire pending s'il n'existe pas
        let pending_dir = self
            .get_managed_dir(&["pending", "directory"], "pending")
            .expect("Failed to get or create pending directory");

        PathBuf::from(pending_dir).join("pending.db")
    }
}
