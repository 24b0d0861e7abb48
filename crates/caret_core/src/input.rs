//! Input constraints, IME actions, and key codes

/// Input constraint kind for an editable field
///
/// Decides the keyboard layout the host shows, which characters the native
/// widget accepts, and whether the display is obscured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InputConstraint {
    /// Plain text input (default)
    #[default]
    Plain,
    /// Integer input (digits and optional sign)
    Numeric,
    /// Decimal number input
    Decimal,
    /// Telephone number input
    Phone,
    /// Email address input
    Email,
    /// URL input
    Url,
    /// Password input (masked display)
    Password,
}

impl InputConstraint {
    /// Check if a character is allowed for this constraint
    pub fn allows_char(&self, c: char) -> bool {
        match self {
            InputConstraint::Plain | InputConstraint::Password => true,
            InputConstraint::Numeric => c.is_ascii_digit() || c == '-' || c == '+',
            InputConstraint::Decimal => c.is_ascii_digit() || c == '.' || c == ',' || c == '-',
            InputConstraint::Phone => c.is_ascii_digit() || "+-() ".contains(c),
            InputConstraint::Email => c.is_ascii_alphanumeric() || "@._-+".contains(c),
            InputConstraint::Url => c.is_ascii() && !c.is_ascii_control(),
        }
    }

    /// Validate a complete value for this constraint
    pub fn validate(&self, value: &str) -> bool {
        if value.is_empty() {
            return true;
        }

        match self {
            InputConstraint::Plain | InputConstraint::Password | InputConstraint::Phone => true,
            InputConstraint::Numeric => value.parse::<i64>().is_ok(),
            InputConstraint::Decimal => value.parse::<f64>().is_ok(),
            InputConstraint::Email => {
                let parts: Vec<&str> = value.split('@').collect();
                parts.len() == 2 && !parts[0].is_empty() && parts[1].contains('.')
            }
            InputConstraint::Url => {
                value.starts_with("http://") || value.starts_with("https://")
            }
        }
    }

    /// Should text entered under this constraint be masked?
    pub fn is_masked(&self) -> bool {
        matches!(self, InputConstraint::Password)
    }

    /// Keyboard layout the host should show for this constraint
    pub fn keyboard_layout(&self) -> KeyboardLayout {
        match self {
            InputConstraint::Plain | InputConstraint::Password => KeyboardLayout::Text,
            InputConstraint::Numeric => KeyboardLayout::Number,
            InputConstraint::Decimal => KeyboardLayout::Decimal,
            InputConstraint::Phone => KeyboardLayout::Phone,
            InputConstraint::Email => KeyboardLayout::Email,
            InputConstraint::Url => KeyboardLayout::Url,
        }
    }
}

/// Host keyboard layout hint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeyboardLayout {
    /// Full text keyboard
    #[default]
    Text,
    /// Integer keypad
    Number,
    /// Decimal keypad
    Decimal,
    /// Phone dial pad
    Phone,
    /// Text keyboard with @ and . prominent
    Email,
    /// Text keyboard with / and .com prominent
    Url,
}

/// Semantic action key shown on the virtual keyboard
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ActionHint {
    /// Finish editing (default)
    #[default]
    Done,
    /// Move to the next field
    Next,
    /// Trigger a search
    Search,
    /// Send the content
    Send,
    /// Navigate / go
    Go,
}

impl ActionHint {
    /// Actions that semantically commit the field's content
    pub fn is_commit(&self) -> bool {
        matches!(
            self,
            ActionHint::Done | ActionHint::Search | ActionHint::Send | ActionHint::Go
        )
    }
}

/// Key codes forwarded from the native widget
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// System back key
    Back,
    /// System menu key
    Menu,
    Enter,
    Tab,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    /// Character input
    Char(char),
    /// Unmapped platform key code
    Other(u16),
}

impl KeyCode {
    /// Keys that must terminate an edit session so the logic thread can
    /// handle them
    pub fn is_system(&self) -> bool {
        matches!(self, KeyCode::Back | KeyCode::Menu)
    }
}
