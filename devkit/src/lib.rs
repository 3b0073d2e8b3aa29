/*!
# Vitals DevKit - Stubs et utilitaires pour les tests de l'agent

Bibliothèque facilitant les tests de l'agent vitals avec:
- Endpoint HTTP stub qui enregistre les notifications reçues
- Scripts de diagnostic jetables (répertoire temporaire)
- Harness combinant les deux, avec les variables d'environnement prêtes
*/

pub mod http_stub;
pub mod script_fixtures;
pub mod test_utils;

pub use http_stub::{ReceivedNotification, StubEndpoint};
pub use script_fixtures::ScriptFixtures;
pub use test_utils::TestHarness;
