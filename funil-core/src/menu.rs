//! The fixed menu funnel: trigger matching rules and reply texts.
//!
//! There is no sub-menu depth. Every option replies and returns to the
//! top level, so routing is a single first-match-wins pass over the
//! normalized text.

/// Substrings that pull any message back to the top-level menu.
///
/// Matched by containment, not equality: free-form greetings like
/// "bom dia, gostaria de fazer um pedido" still land on the menu.
pub const GREETING_TRIGGERS: &[&str] = &[
    "menu",
    "oi",
    "olá",
    "ola",
    "bom dia",
    "boa tarde",
    "boa noite",
];

/// Top-level menu shown for greetings and "menu".
pub const MENU_TEXT: &str = "👕 Linha Reta! É um prazer ter você como cliente.\n\n\
    Aqui na nossa loja, cada atendimento é feito com atenção e rapidez.\n\n\
    Escolha a opção que melhor atende você:\n\
    1️⃣ Fazer pedido\n\
    2️⃣ Informações sobre envios e fretes\n\
    3️⃣ Falar diretamente com nossa equipe\n\
    0️⃣ Encerrar atendimento";

/// Option 1: how to place an order.
pub const ORDERING_TEXT: &str = "🛒 Perfeito! Fazer seu pedido é rápido e fácil:\n\
    - Pelo WhatsApp: envie a lista dos produtos que deseja\n\
    - Pelo site: www.linharetastore.com.br\n\
    - Pelo Instagram: @linha.retastore\n\n\
    Ou nos diga qual produto você deseja adquirir, e nosso time irá te atender rapidinho.\n\
    Digite 'menu' a qualquer momento para voltar ao início.";

/// Option 2: shipping and delivery info.
pub const SHIPPING_TEXT: &str = "🚚 Sobre envio e entrega:\n\
    - Fazemos entregas para todo o Brasil (frete por conta do cliente)\n\
    - Para a região da loja, podemos combinar entregas diretamente com o cliente\n\
    Digite 'menu' para voltar ao início.";

/// Option 3: hand-off to a human.
pub const HANDOFF_TEXT: &str = "📞 Ótimo! Você iniciou o atendimento com nossa equipe.\n\
    Nos conte sua dúvida, nosso time vai te responder com atenção e rapidez.\n\
    Digite 'menu' para voltar ao início quando quiser.";

/// Option 0: conversation explicitly ended by the sender.
pub const CLOSING_TEXT: &str = "✅ Atendimento encerrado.\n \
    Agradecemos seu contato e esperamos vê-lo em breve! 👕";

/// Anything that matches no rule.
pub const FALLBACK_TEXT: &str = "❌ Ops! Não reconhecemos essa opção. \
    Digite um número de 0 a 3 ou 'menu' para voltar ao menu principal.";

/// Sent when the inactivity window elapses without a message.
pub const INACTIVITY_TEXT: &str = "⏳ Você ficou inativo por algum tempo.\n \
    Encerramos o atendimento por enquanto.\n\n\
    ✅ Agradecemos seu contato! Quando quiser, é só nos enviar uma mensagem para reiniciar o atendimento.";

/// Trim plus lowercase, the only normalization dispatch applies.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Where a normalized message lands in the funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuRoute {
    /// Exactly "0": end the conversation
    Close,
    /// Greeting or "menu" trigger: show the option list
    Menu,
    /// Exactly "1": ordering instructions
    Ordering,
    /// Exactly "2": shipping info
    Shipping,
    /// Exactly "3": talk to the team
    Handoff,
    /// Everything else
    Fallback,
}

impl MenuRoute {
    /// Route normalized text. First match wins, evaluated in funnel order:
    /// exact "0", greeting containment, exact "1"/"2"/"3", fallback.
    ///
    /// Numeric options use equality so numbers embedded in sentences do not
    /// mis-trigger ("11" is not option 1).
    pub fn for_text(text: &str) -> Self {
        if text == "0" {
            return Self::Close;
        }
        if GREETING_TRIGGERS.iter().any(|trigger| text.contains(trigger)) {
            return Self::Menu;
        }
        match text {
            "1" => Self::Ordering,
            "2" => Self::Shipping,
            "3" => Self::Handoff,
            _ => Self::Fallback,
        }
    }

    /// The fixed reply sent for this route.
    pub const fn reply_text(self) -> &'static str {
        match self {
            Self::Close => CLOSING_TEXT,
            Self::Menu => MENU_TEXT,
            Self::Ordering => ORDERING_TEXT,
            Self::Shipping => SHIPPING_TEXT,
            Self::Handoff => HANDOFF_TEXT,
            Self::Fallback => FALLBACK_TEXT,
        }
    }
}
