//! RFM69 register addresses and bit layout referenced by
//! [`crate::radio::rfm69::RadioDevice::configure`]'s HopeRF/Semtech RFM69
//! implementation.
//!
//! Ground truth: the call sequence in `Transceiver_Init`
//! (`firmware/src/common/transceiver/Transceiver.c`, every
//! `libRFM69_Set*`/`libRFM69_Enable*` call corresponds to one write here).
//! The IRQ flag bit positions are taken directly from
//! `firmware/src/common_library/libRFM69.c`'s own `irqflags2_bit_type`
//! enum and its `IsBitSetInRegister(REG_IRQFLAGS1, bit)` call sites, not
//! guessed from a datasheet. The register *addresses* themselves (the
//! numeric byte offsets) aren't in that file — they come from
//! `RFM69Registers.h`, a header this pack doesn't carry a copy of — so
//! those follow the standard Semtech/HopeRF RFM69 register map instead;
//! see `DESIGN.md`'s Open Questions.

/// SPI write bit: OR into the address byte to select a register write
/// instead of a read, matching every HopeRF/Semtech RFM69 SPI driver.
pub const WRITE_BIT: u8 = 0x80;

pub const REG_FIFO: u8 = 0x00;
pub const REG_OPMODE: u8 = 0x01;
pub const REG_DATAMODUL: u8 = 0x02;
pub const REG_BITRATE_MSB: u8 = 0x03;
pub const REG_BITRATE_LSB: u8 = 0x04;
pub const REG_FDEV_MSB: u8 = 0x05;
pub const REG_FDEV_LSB: u8 = 0x06;
pub const REG_FRF_MSB: u8 = 0x07;
pub const REG_FRF_MID: u8 = 0x08;
pub const REG_FRF_LSB: u8 = 0x09;
pub const REG_PALEVEL: u8 = 0x11;
pub const REG_OCP: u8 = 0x13;
pub const REG_LNA: u8 = 0x18;
pub const REG_AFCFEI: u8 = 0x1E;
pub const REG_RSSICONFIG: u8 = 0x23;
pub const REG_RSSIVALUE: u8 = 0x24;
pub const REG_DIOMAPPING2: u8 = 0x26;
pub const REG_IRQFLAGS1: u8 = 0x27;
pub const REG_IRQFLAGS2: u8 = 0x28;
pub const REG_RSSITHRESH: u8 = 0x29;
/// Timeout between entering Rx and an RSSI-threshold hit, in units of
/// `16 / bitrate`. 0xFF at 4800 bps is 255 * 16 / 4800 s ~= 850 ms,
/// matching `Transceiver_Init`'s `libRFM69_SetRSSIThresholdTimeout(850)`.
pub const REG_RXTIMEOUT1: u8 = 0x2A;
/// Timeout between an RSSI-threshold hit and `PayloadReady`, same units.
/// Left at its POR default (disabled), matching `Transceiver_Init`'s
/// `libRFM69_SetRxTimeout(0)`.
pub const REG_RXTIMEOUT2: u8 = 0x2B;
pub const REG_PREAMBLE_MSB: u8 = 0x2C;
pub const REG_PREAMBLE_LSB: u8 = 0x2D;
pub const REG_SYNCCONFIG: u8 = 0x2E;
pub const REG_SYNCVALUE1: u8 = 0x2F;
pub const REG_PACKETCONFIG1: u8 = 0x37;
pub const REG_PAYLOADLENGTH: u8 = 0x38;
pub const REG_NODEADRS: u8 = 0x39;
pub const REG_BROADCASTADRS: u8 = 0x3A;
pub const REG_FIFOTHRESH: u8 = 0x3C;
pub const REG_PACKETCONFIG2: u8 = 0x3D;
pub const REG_AESKEY1: u8 = 0x3E;
pub const REG_TESTDAGC: u8 = 0x6F;

/// `RegIrqFlags1` bit 7: set once the requested mode transition (Tx, Rx,
/// synthesizer, ...) has completed. `RF_IRQFLAGS1_MODEREADY` per
/// `libRFM69_IsModeReady`.
pub const IRQFLAGS1_MODE_READY: u8 = 1 << 7;
/// `RegIrqFlags1` bit 2: set when no payload was received before the Rx
/// timeout elapsed. `libRFM69_IsRxTimeoutFlagSet` reads
/// `IsBitSetInRegister(REG_IRQFLAGS1, 2)`.
pub const IRQFLAGS1_RX_TIMEOUT: u8 = 1 << 2;
/// `RegIrqFlags2` bit 2: a full, address-filtered, CRC-valid packet sits
/// in the FIFO. `REG_IRQFLAGS2_BIT_PAYLOADREADY` in `libRFM69.c`'s
/// `irqflags2_bit_type` enum.
pub const IRQFLAGS2_PAYLOAD_READY: u8 = 1 << 2;
/// `RegIrqFlags2` bit 3: the last requested transmission has completed.
/// `REG_IRQFLAGS2_BIT_PACKETSENT` in the same enum.
pub const IRQFLAGS2_PACKET_SENT: u8 = 1 << 3;
/// `RegIrqFlags2` bit 6: at least one byte is queued in the FIFO.
/// `REG_IRQFLAGS2_BIT_FIFONOTEMPTY` in the same enum, read via
/// `libRFM69_IsFIFONotEmpty`.
pub const IRQFLAGS2_FIFO_NOT_EMPTY: u8 = 1 << 6;

/// `RegPacketConfig2` bit 2: forces the receiver FSM back to Rx, clearing
/// the Rx FIFO and restarting AFC/synchronization.
pub const PACKETCONFIG2_RESTART_RX: u8 = 1 << 2;

/// `RegOpMode`'s 3-bit mode field, shifted into place at bits [4:2].
pub const OPMODE_MODE_SHIFT: u8 = 2;
pub const OPMODE_MODE_MASK: u8 = 0b0001_1100;
