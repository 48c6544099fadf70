use tracing::error;

use crate::error::PlatformResult;
use crate::links::MessageLink;
use crate::platform::{
    DeliveryTarget, Embed, EmbedField, FileUpload, LinkButtons, OutgoingMessage, Platform,
};
use crate::preview::{ImagePresentation, PreviewPayload};

/// Turn a composed preview into the message that gets sent.
pub fn build_message(payload: PreviewPayload) -> OutgoingMessage {
    let mut main = Embed {
        description: Some(payload.base.text.clone()),
        color: payload.color,
        author: Some(payload.base.author.clone()),
        footer_text: Some(payload.base.footer_text.clone()),
        footer_icon_url: payload.base.footer_icon_url.clone(),
        timestamp: Some(payload.base.timestamp),
        ..Default::default()
    };

    if let Some(reactions) = payload.reaction_summary() {
        main.fields.push(field("Reactions", reactions));
    }
    if let Some(names) = payload.attachment_names {
        main.fields.push(field("Attachments", names));
    }
    if let Some(videos) = payload.video_links {
        main.fields.push(field("Videos", videos));
    }

    let mut extra = Vec::new();
    let mut file = None;
    match payload.images {
        ImagePresentation::None => {}
        ImagePresentation::Inline(url) => main.image_url = Some(url),
        ImagePresentation::Extra { first, rest } => {
            main.image_url = Some(first);
            extra = rest
                .into_iter()
                .map(|url| Embed {
                    color: payload.color,
                    image_url: Some(url),
                    ..Default::default()
                })
                .collect();
        }
        ImagePresentation::Grid(grid) => {
            main.image_url = Some(grid.attachment_url());
            file = Some(FileUpload {
                filename: grid.filename,
                data: grid.data,
            });
        }
    }

    let mut embeds = vec![main];
    embeds.extend(extra);

    OutgoingMessage {
        content: None,
        embeds,
        file,
        buttons: payload.controls.as_ref().map(link_buttons),
        ephemeral: false,
    }
}

fn field(name: &str, value: String) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value,
        inline: false,
    }
}

fn link_buttons(link: &MessageLink) -> LinkButtons {
    LinkButtons {
        reveal_custom_id: link.to_custom_id(),
        url: link.url(),
    }
}

/// Send a preview. Rejections are logged and handed back so the command
/// path can tell the requester; passive replies simply drop them.
pub async fn deliver(
    platform: &dyn Platform,
    payload: PreviewPayload,
    target: &DeliveryTarget,
) -> PlatformResult<()> {
    let message = build_message(payload);
    if let Err(e) = platform.send(target, message).await {
        error!(error = %e, "failed to send preview");
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridImage;
    use crate::platform::testing::MockPlatform;
    use crate::platform::{Author, Reaction};
    use crate::preview::BaseDescription;
    use chrono::{TimeZone, Utc};

    fn payload(images: ImagePresentation) -> PreviewPayload {
        PreviewPayload {
            base: BaseDescription {
                text: "hello".to_string(),
                author: Author {
                    display_name: "alice".to_string(),
                    avatar_url: None,
                },
                footer_text: "#general | guild".to_string(),
                footer_icon_url: None,
                timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            },
            color: 0x5865F2,
            reactions: Vec::new(),
            attachment_names: None,
            video_links: None,
            images,
            controls: Some(MessageLink::new(10, 20, 30)),
        }
    }

    #[test]
    fn test_plain_preview() {
        let message = build_message(payload(ImagePresentation::None));
        assert_eq!(message.embeds.len(), 1);
        assert_eq!(message.embeds[0].description.as_deref(), Some("hello"));
        assert!(message.embeds[0].fields.is_empty());
        assert!(message.embeds[0].image_url.is_none());
        assert!(message.file.is_none());
        assert!(!message.ephemeral);

        let buttons = message.buttons.unwrap();
        assert_eq!(buttons.url, "https://discord.com/channels/10/20/30");
        assert_eq!(buttons.reveal_custom_id, "msglink:reveal:10:20:30");
    }

    #[test]
    fn test_fields_in_order() {
        let mut p = payload(ImagePresentation::None);
        p.reactions = vec![Reaction {
            emoji: "🔥".to_string(),
            count: 2,
        }];
        p.attachment_names = Some("notes.pdf".to_string());
        p.video_links = Some("[Video](https://cdn.example/v.mp4)".to_string());

        let message = build_message(p);
        let names: Vec<_> = message.embeds[0]
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Reactions", "Attachments", "Videos"]);
        assert_eq!(message.embeds[0].fields[0].value, "🔥 2");
    }

    #[test]
    fn test_extra_embeds_are_image_only() {
        let message = build_message(payload(ImagePresentation::Extra {
            first: "https://cdn.example/1.png".to_string(),
            rest: vec![
                "https://cdn.example/2.png".to_string(),
                "https://cdn.example/3.png".to_string(),
            ],
        }));
        assert_eq!(message.embeds.len(), 3);
        assert_eq!(
            message.embeds[0].image_url.as_deref(),
            Some("https://cdn.example/1.png")
        );
        assert!(message.embeds[1].description.is_none());
        assert_eq!(
            message.embeds[2].image_url.as_deref(),
            Some("https://cdn.example/3.png")
        );
        assert!(message.file.is_none());
    }

    #[test]
    fn test_grid_is_file_referenced_by_main_embed() {
        let grid = GridImage {
            filename: "grid-abc.png".to_string(),
            data: vec![1, 2, 3],
        };
        let message = build_message(payload(ImagePresentation::Grid(grid)));
        assert_eq!(message.embeds.len(), 1);
        assert_eq!(
            message.embeds[0].image_url.as_deref(),
            Some("attachment://grid-abc.png")
        );
        assert_eq!(message.file.unwrap().filename, "grid-abc.png");
    }

    #[test]
    fn test_largest_custom_id_fits_component_limit() {
        let buttons = link_buttons(&MessageLink::new(u64::MAX, u64::MAX, u64::MAX));
        // Discord caps component custom ids at 100 characters
        assert!(buttons.reveal_custom_id.len() <= 100);
        assert_eq!(
            MessageLink::from_custom_id(&buttons.reveal_custom_id),
            Some(MessageLink::new(u64::MAX, u64::MAX, u64::MAX))
        );
    }

    #[test]
    fn test_no_controls_no_buttons() {
        let mut p = payload(ImagePresentation::None);
        p.controls = None;
        assert!(build_message(p).buttons.is_none());
    }

    #[tokio::test]
    async fn test_rejected_delivery_is_returned() {
        let platform = MockPlatform::new().rejecting_sends();
        let target = DeliveryTarget::Reply {
            channel_id: 1,
            message_id: 2,
        };
        let result = deliver(&platform, payload(ImagePresentation::None), &target).await;
        assert!(result.is_err());
        assert!(platform.sent().is_empty());
    }
}
