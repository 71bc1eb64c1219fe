//! Conversion from grammers messages and dialogs into telegrab's own types.

use grammers_client::media::Media;
use grammers_client::message::Message;
use grammers_client::peer::Peer;
use grammers_session::Session;
use grammers_session::types::{PeerAuth, PeerRef};
use grammers_tl_types as tl;

use crate::models::{Conversation, DocumentAttribute, DocumentRecord, MediaRecord, MessageRecord};

/// Convert a grammers Message into a MessageRecord.
pub fn message_to_record(msg: &Message) -> MessageRecord {
    MessageRecord {
        id: msg.id(),
        date: msg.date(),
        text: msg.text().to_string(),
        media: msg.media().as_ref().map(media_to_record),
    }
}

fn media_to_record(media: &Media) -> MediaRecord {
    let (kind, document) = match media {
        Media::Document(doc) => ("document", document_record(&doc.raw)),
        Media::Photo(_) => ("photo", None),
        Media::Sticker(_) => ("sticker", None),
        Media::Contact(_) => ("contact", None),
        Media::Poll(_) => ("poll", None),
        Media::Geo(_) => ("geo", None),
        Media::Dice(_) => ("dice", None),
        Media::Venue(_) => ("venue", None),
        Media::GeoLive(_) => ("geo_live", None),
        Media::WebPage(_) => ("webpage", None),
        _ => ("other", None),
    };
    MediaRecord {
        kind: kind.to_string(),
        document,
    }
}

fn document_record(raw: &tl::types::MessageMediaDocument) -> Option<DocumentRecord> {
    match raw.document.as_ref()? {
        tl::enums::Document::Document(d) => Some(DocumentRecord {
            id: d.id,
            mime_type: d.mime_type.clone(),
            size: d.size,
            attributes: Some(d.attributes.iter().map(attribute_record).collect()),
        }),
        tl::enums::Document::Empty(_) => None,
    }
}

fn attribute_record(attr: &tl::enums::DocumentAttribute) -> DocumentAttribute {
    let kind = match attr {
        tl::enums::DocumentAttribute::Filename(f) => {
            return DocumentAttribute::Filename {
                file_name: f.file_name.clone(),
            };
        }
        tl::enums::DocumentAttribute::ImageSize(_) => "image_size",
        tl::enums::DocumentAttribute::Sticker(_) => "sticker",
        tl::enums::DocumentAttribute::Video(_) => "video",
        tl::enums::DocumentAttribute::Audio(_) => "audio",
        _ => "other",
    };
    DocumentAttribute::Other { kind: kind.to_string() }
}

/// Convert a dialog peer into a Conversation carrying a PeerRef for history iteration.
///
/// Dialog iteration caches every peer (with its access hash) in the session,
/// so the hash is looked up there. Basic group chats have none and use 0.
pub async fn peer_to_conversation<S: Session>(peer: &Peer, session: &S) -> Conversation<PeerRef> {
    let peer_id = peer.id();

    let (title, full_name) = match peer {
        Peer::User(user) => (None, Some(user.full_name())),
        _ => (peer.name().map(|n| n.to_string()), None),
    };

    let auth = session
        .peer(peer_id)
        .await
        .and_then(|info| info.auth())
        .unwrap_or(PeerAuth::from_hash(0));

    Conversation {
        id: peer_id.bare_id(),
        title,
        full_name,
        peer: PeerRef { id: peer_id, auth },
    }
}
