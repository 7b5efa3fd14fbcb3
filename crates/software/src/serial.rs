//! MIDI uses UART-style framing: a low start bit, eight data bits sent least-significant first, and a high stop
//! bit. Between frames the line idles high. Both directions here are clocked by the baud tick and see one bit
//! per tick; there is no oversampling.

mod decoder;
pub use decoder::*;

mod encoder;
pub use encoder::*;

/// Baud ticks occupied by a single byte on the wire: start bit, eight data bits, stop bit.
pub const BITS_PER_FRAME: u8 = 10;

/// Number of data bits in a frame.
const DATA_BITS: u8 = 8;

/// Line level of an idle line and of the stop bit.
pub const IDLE_LEVEL: bool = true;
