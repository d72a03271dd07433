//! The console's route surface.

use strum::{EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter)]
pub enum Route {
  #[strum(serialize = "/")]
  Home,
  #[strum(serialize = "/whatsapp")]
  Whatsapp,
  #[strum(serialize = "/prompt")]
  Prompt,
  #[strum(serialize = "/base-de-conhecimento")]
  KnowledgeBase,
  #[strum(serialize = "/reset-memory")]
  ResetMemory,
  #[strum(serialize = "/reset-password")]
  ResetPassword,
  #[strum(serialize = "/profile")]
  Profile,
}

impl Route {
  /// Navigation bar order.
  pub const NAV: [Route; 5] = [
    Route::Whatsapp,
    Route::Prompt,
    Route::KnowledgeBase,
    Route::ResetMemory,
    Route::Profile,
  ];

  pub fn path(self) -> &'static str { self.into() }

  /// Everything but the login page and the password-reset landing page.
  pub fn requires_session(self) -> bool { !matches!(self, Route::Home | Route::ResetPassword) }

  pub fn title(self) -> &'static str {
    match self {
      Route::Home => "Kaisan",
      Route::Whatsapp => "WhatsApp",
      Route::Prompt => "Prompt do Sistema",
      Route::KnowledgeBase => "Base de Conhecimento",
      Route::ResetMemory => "Resetar Memória",
      Route::ResetPassword => "Redefinir Senha",
      Route::Profile => "Meu Perfil",
    }
  }
}

impl std::fmt::Display for Route {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.path()) }
}
