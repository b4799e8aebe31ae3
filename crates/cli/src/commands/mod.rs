pub mod detect;
pub mod inspect;

use clap::ValueEnum;
use deepfake_common::ChannelOrder;

/// `--channel-order` values
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ChannelOrderArg {
    Bgr,
    Rgb,
}

impl From<ChannelOrderArg> for ChannelOrder {
    fn from(arg: ChannelOrderArg) -> Self {
        match arg {
            ChannelOrderArg::Bgr => ChannelOrder::Bgr,
            ChannelOrderArg::Rgb => ChannelOrder::Rgb,
        }
    }
}
